//! Canonical configuration and snapshot reconciliation
//!
//! The management channel delivers an opaque key/value snapshot in which
//! any key may be missing and values are loosely typed (strings, integers,
//! booleans spelled "ON"/"OFF"). [`reconcile`] converts the latest snapshot
//! into a fully-defaulted [`CanonicalConfig`] record. A malformed value is
//! never fatal: the field falls back to its default and the mismatch is
//! logged.

pub mod watcher;

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::display;
use crate::entity::decode_entities;

/// Raw configuration snapshot as delivered by the management channel.
pub type ConfigSnapshot = HashMap<String, Value>;

/// URL shown when the snapshot carries no `URL` key.
pub const DEFAULT_URL: &str = "https://www.jamf.com/solutions/industries/retail/";

/// Recognized snapshot keys.
pub mod keys {
    pub const MAINTENANCE_MODE: &str = "MAINTENANCE_MODE";
    pub const URL: &str = "URL";
    pub const BROWSER_MODE: &str = "BROWSER_MODE";
    pub const BROWSER_MODE_LOCK: &str = "BROWSER_MODE_LOCK";
    pub const PRIVACY_MODE: &str = "PRIVACY_MODE";
    pub const ASAM: &str = "ASAM";
    pub const ASAM_OFF_URL: &str = "ASAM_OFF_URL";
    pub const RESET_TIMER: &str = "RESET_TIMER";
    pub const RESET_ON_SCROLL: &str = "RESET_ON_SCROLL";
    pub const QR_CODE: &str = "QR_CODE";
    pub const POP_UP: &str = "POP_UP";
    pub const REDIRECT: &str = "REDIRECT";
    pub const SSL_TRUST: &str = "SSL_TRUST";
    pub const DECODE_URL: &str = "DECODE_URL";
    pub const CONFIG_LISTENER: &str = "CONFIG_LISTENER";
    pub const DELAY_LAUNCH: &str = "DELAY_LAUNCH";

    pub const RECOGNIZED: &[&str] = &[
        MAINTENANCE_MODE,
        URL,
        BROWSER_MODE,
        BROWSER_MODE_LOCK,
        PRIVACY_MODE,
        ASAM,
        ASAM_OFF_URL,
        RESET_TIMER,
        RESET_ON_SCROLL,
        QR_CODE,
        POP_UP,
        REDIRECT,
        SSL_TRUST,
        DECODE_URL,
        CONFIG_LISTENER,
        DELAY_LAUNCH,
    ];
}

/// Recoverable snapshot value errors.
///
/// These are reported and the affected field falls back to its default;
/// they are never propagated out of reconciliation.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("expected \"ON\" or \"OFF\", got {0}")]
    NotToggle(String),
    #[error("expected a non-negative integer, got {0}")]
    NotInteger(String),
    #[error("expected a string, got {0}")]
    NotString(String),
    #[error("not a valid URL: {0}")]
    BadUrl(String),
    #[error("unrecognized redirect policy {0:?} (expected OFF, INLINE or NEW_SURFACE)")]
    BadRedirect(String),
}

/// How requests to open auxiliary render surfaces are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Ignore the request entirely.
    #[default]
    Off,
    /// Redirect frameless top-level navigations into the current surface.
    Inline,
    /// Open a tracked secondary surface (torn down on session reset).
    NewSurface,
}

/// The controller's fully-defaulted configuration record.
///
/// Exactly one record is live at a time; reconciliation builds a new one
/// and swaps it in, never mutating the old record in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalConfig {
    /// When ON, the display target is overridden with the maintenance asset.
    pub maintenance_mode: bool,
    /// Current navigation target. May diverge from `home_url` after QR
    /// scans, deep links, or address-bar navigation.
    pub target_url: Option<Url>,
    /// Anchor used by session reset and the idle timeout.
    pub home_url: Option<Url>,
    /// Last URL actually dispatched to the render surface. Used only for
    /// change detection to avoid redundant loads.
    pub previous_url: Option<Url>,
    /// Whether interactive chrome (back/forward/address bar) is shown.
    pub browser_mode: bool,
    /// Whether the address bar is read-only.
    pub browser_mode_locked: bool,
    /// Whether the render surface uses a non-persistent storage partition.
    /// Changing this invalidates and recreates the surface.
    pub privacy_mode: bool,
    /// Desired single-app-lock state.
    pub lock_target: bool,
    /// Last confirmed single-app-lock state. Written only by the lock
    /// state machine, never by reconciliation.
    pub lock_observed: bool,
    /// Idle seconds before a session reset; 0 disables the timer.
    pub idle_reset_seconds: u64,
    /// Whether detected user activity re-arms the idle timer.
    pub reset_on_scroll: bool,
    /// Non-empty: any displayed URL containing this substring forces the
    /// lock off regardless of `lock_target`.
    pub lock_suppress_substring: String,
    /// Whether QR scan events are consumed as navigation requests.
    pub qr_enabled: bool,
    /// Whether auxiliary surfaces may open automatically.
    pub popup_auto_open: bool,
    pub redirect_policy: RedirectPolicy,
    /// Accept any server certificate when ON. Logged whenever exercised.
    pub trust_override: bool,
    /// Pass the raw `URL` value through the entity decoder first.
    pub entity_decode_enabled: bool,
    /// Whether configuration-changed notifications trigger reconciliation.
    pub config_listener_enabled: bool,
    /// Seconds to postpone the initial navigation after boot.
    pub launch_delay_seconds: u64,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        let home = Url::parse(DEFAULT_URL).ok();
        Self {
            maintenance_mode: false,
            target_url: home.clone(),
            home_url: home,
            previous_url: None,
            browser_mode: false,
            browser_mode_locked: false,
            privacy_mode: false,
            lock_target: false,
            lock_observed: false,
            idle_reset_seconds: 0,
            reset_on_scroll: false,
            lock_suppress_substring: String::new(),
            qr_enabled: false,
            popup_auto_open: false,
            redirect_policy: RedirectPolicy::Off,
            trust_override: false,
            entity_decode_enabled: false,
            config_listener_enabled: true,
            launch_delay_seconds: 0,
        }
    }
}

/// Build a new canonical record from the latest snapshot.
///
/// Every recognized key present in the snapshot is parsed and applied;
/// absent keys take their defaults. Runtime state (`previous_url`,
/// `lock_observed`, and a still-valid `target_url` divergence) is carried
/// over from `current`. The `DECODE_URL` flag is settled before the `URL`
/// key is evaluated.
pub fn reconcile(current: &CanonicalConfig, snapshot: &ConfigSnapshot) -> CanonicalConfig {
    for key in snapshot.keys() {
        if !keys::RECOGNIZED.contains(&key.as_str()) {
            debug!(key, "ignoring unrecognized configuration key");
        }
    }

    let mut next = CanonicalConfig {
        previous_url: current.previous_url.clone(),
        lock_observed: current.lock_observed,
        ..CanonicalConfig::default()
    };

    // DECODE_URL first: it changes how the URL key is read.
    next.entity_decode_enabled = toggle_key(snapshot, keys::DECODE_URL, false);

    next.home_url = url_key(snapshot, keys::URL, next.entity_decode_enabled);
    // A target diverged by QR/deep-link navigation survives reconciliation
    // only while the configured home is unchanged; a new URL key retargets.
    next.target_url = if next.home_url == current.home_url {
        current.target_url.clone()
    } else {
        next.home_url.clone()
    };

    next.maintenance_mode = toggle_key(snapshot, keys::MAINTENANCE_MODE, false);
    next.browser_mode = toggle_key(snapshot, keys::BROWSER_MODE, false);
    next.browser_mode_locked = toggle_key(snapshot, keys::BROWSER_MODE_LOCK, false);
    next.privacy_mode = toggle_key(snapshot, keys::PRIVACY_MODE, false);
    next.lock_target = toggle_key(snapshot, keys::ASAM, false);
    next.lock_suppress_substring = string_key(snapshot, keys::ASAM_OFF_URL);
    next.idle_reset_seconds = integer_key(snapshot, keys::RESET_TIMER, 0);
    next.reset_on_scroll = toggle_key(snapshot, keys::RESET_ON_SCROLL, false);
    next.qr_enabled = toggle_key(snapshot, keys::QR_CODE, false);
    next.popup_auto_open = toggle_key(snapshot, keys::POP_UP, false);
    next.redirect_policy = redirect_key(snapshot, keys::REDIRECT);
    next.trust_override = toggle_key(snapshot, keys::SSL_TRUST, false);
    next.config_listener_enabled = toggle_key(snapshot, keys::CONFIG_LISTENER, true);
    next.launch_delay_seconds = integer_key(snapshot, keys::DELAY_LAUNCH, 0);

    next
}

fn toggle_key(snapshot: &ConfigSnapshot, key: &str, default: bool) -> bool {
    match snapshot.get(key).map(parse_toggle) {
        None => default,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!(key, error = %e, "malformed snapshot value, using default");
            default
        }
    }
}

fn integer_key(snapshot: &ConfigSnapshot, key: &str, default: u64) -> u64 {
    match snapshot.get(key).map(parse_integer) {
        None => default,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!(key, error = %e, "malformed snapshot value, using default");
            default
        }
    }
}

fn string_key(snapshot: &ConfigSnapshot, key: &str) -> String {
    match snapshot.get(key).map(parse_string) {
        None => String::new(),
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!(key, error = %e, "malformed snapshot value, using default");
            String::new()
        }
    }
}

fn redirect_key(snapshot: &ConfigSnapshot, key: &str) -> RedirectPolicy {
    let parse = |value: &Value| -> Result<RedirectPolicy, ValueError> {
        match parse_string(value)?.as_str() {
            "OFF" => Ok(RedirectPolicy::Off),
            "INLINE" => Ok(RedirectPolicy::Inline),
            "NEW_SURFACE" => Ok(RedirectPolicy::NewSurface),
            other => Err(ValueError::BadRedirect(other.to_string())),
        }
    };
    match snapshot.get(key).map(parse) {
        None => RedirectPolicy::Off,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            warn!(key, error = %e, "malformed snapshot value, using default");
            RedirectPolicy::Off
        }
    }
}

fn url_key(snapshot: &ConfigSnapshot, key: &str, decode: bool) -> Option<Url> {
    let value = match snapshot.get(key) {
        Some(v) => v,
        None => return CanonicalConfig::default().home_url,
    };

    let parsed = parse_string(value).and_then(|raw| {
        let raw = if decode { decode_entities(&raw) } else { raw };
        display::parse_lenient(&raw).ok_or(ValueError::BadUrl(raw))
    });

    match parsed {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(key, error = %e, "malformed snapshot value, using default");
            CanonicalConfig::default().home_url
        }
    }
}

fn parse_toggle(value: &Value) -> Result<bool, ValueError> {
    match value.as_str() {
        Some("ON") => Ok(true),
        Some("OFF") => Ok(false),
        _ => Err(ValueError::NotToggle(value.to_string())),
    }
}

fn parse_integer(value: &Value) -> Result<u64, ValueError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.trim().parse::<u64>() {
            return Ok(n);
        }
    }
    Err(ValueError::NotInteger(value.to_string()))
}

fn parse_string(value: &Value) -> Result<String, ValueError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValueError::NotString(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, Value)]) -> ConfigSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_yields_defaults() {
        let config = reconcile(&CanonicalConfig::default(), &ConfigSnapshot::new());
        assert_eq!(config, CanonicalConfig::default());
        assert_eq!(config.home_url.as_ref().unwrap().as_str(), DEFAULT_URL);
        assert!(config.config_listener_enabled);
        assert_eq!(config.idle_reset_seconds, 0);
    }

    #[test]
    fn test_toggle_parsing() {
        let snap = snapshot(&[
            ("MAINTENANCE_MODE", json!("ON")),
            ("ASAM", json!("ON")),
            ("CONFIG_LISTENER", json!("OFF")),
        ]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert!(config.maintenance_mode);
        assert!(config.lock_target);
        assert!(!config.config_listener_enabled);
    }

    #[test]
    fn test_type_mismatch_falls_back_to_default() {
        let snap = snapshot(&[
            ("MAINTENANCE_MODE", json!(true)),
            ("RESET_TIMER", json!("soon")),
            ("ASAM_OFF_URL", json!(7)),
            ("REDIRECT", json!("SIDEWAYS")),
        ]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert!(!config.maintenance_mode);
        assert_eq!(config.idle_reset_seconds, 0);
        assert_eq!(config.lock_suppress_substring, "");
        assert_eq!(config.redirect_policy, RedirectPolicy::Off);
    }

    #[test]
    fn test_integer_accepts_number_and_numeric_string() {
        let snap = snapshot(&[("RESET_TIMER", json!(30)), ("DELAY_LAUNCH", json!("5"))]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert_eq!(config.idle_reset_seconds, 30);
        assert_eq!(config.launch_delay_seconds, 5);
    }

    #[test]
    fn test_unrecognized_key_ignored() {
        let snap = snapshot(&[("FROBNICATE", json!("ON"))]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert_eq!(config, CanonicalConfig::default());
    }

    #[test]
    fn test_decode_url_settled_before_url() {
        let snap = snapshot(&[
            ("DECODE_URL", json!("ON")),
            ("URL", json!("https://example.test/?a=1&amp;b=2")),
        ]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert_eq!(
            config.home_url.as_ref().unwrap().as_str(),
            "https://example.test/?a=1&b=2"
        );
    }

    #[test]
    fn test_url_not_decoded_by_default() {
        let snap = snapshot(&[("URL", json!("https://example.test/?a=1&amp;b=2"))]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert_eq!(
            config.home_url.as_ref().unwrap().as_str(),
            "https://example.test/?a=1&amp;b=2"
        );
    }

    #[test]
    fn test_malformed_url_falls_back_to_default() {
        let snap = snapshot(&[("URL", json!("http://[not-a-url"))]);
        let config = reconcile(&CanonicalConfig::default(), &snap);
        assert_eq!(config.home_url.as_ref().unwrap().as_str(), DEFAULT_URL);
    }

    #[test]
    fn test_runtime_state_carried_over() {
        let current = CanonicalConfig {
            previous_url: Url::parse("https://shown.test/").ok(),
            lock_observed: true,
            ..CanonicalConfig::default()
        };

        let config = reconcile(&current, &ConfigSnapshot::new());
        assert_eq!(config.previous_url, current.previous_url);
        assert!(config.lock_observed);
    }

    #[test]
    fn test_target_divergence_survives_same_home() {
        let current = CanonicalConfig {
            target_url: Url::parse("https://scanned.test/page").ok(),
            ..CanonicalConfig::default()
        };

        let config = reconcile(&current, &ConfigSnapshot::new());
        assert_eq!(
            config.target_url.as_ref().unwrap().as_str(),
            "https://scanned.test/page"
        );
    }

    #[test]
    fn test_new_url_key_retargets() {
        let current = CanonicalConfig {
            target_url: Url::parse("https://scanned.test/page").ok(),
            ..CanonicalConfig::default()
        };

        let snap = snapshot(&[("URL", json!("https://fresh.test/"))]);
        let config = reconcile(&current, &snap);
        assert_eq!(config.home_url, config.target_url);
        assert_eq!(
            config.target_url.as_ref().unwrap().as_str(),
            "https://fresh.test/"
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let snap = snapshot(&[
            ("URL", json!("https://kiosk.test/")),
            ("ASAM", json!("ON")),
            ("RESET_TIMER", json!(60)),
        ]);
        let first = reconcile(&CanonicalConfig::default(), &snap);
        let second = reconcile(&first, &snap);
        assert_eq!(first, second);
    }
}
