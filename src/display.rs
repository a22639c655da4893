//! Display resolution policy
//!
//! Derives the single "URL to show now" from a canonical configuration
//! record. Navigation is always issued against the result of
//! [`effective_url`], never against `target_url` directly.

use url::Url;

use crate::config::CanonicalConfig;

/// Parse a raw configuration string into a URL, tolerating a missing
/// scheme by assuming `https`.
pub fn parse_lenient(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).ok()
        }
        Err(_) => None,
    }
}

/// Resolve the URL to display for `config`.
///
/// Maintenance mode overrides everything with the bundled maintenance
/// asset. Otherwise the configured target is returned with its scheme
/// normalized: custom (non-http/https) schemes are rewritten to `https`,
/// every other URL component passes through unchanged.
pub fn effective_url(config: &CanonicalConfig, maintenance_asset: &Url) -> Option<Url> {
    if config.maintenance_mode {
        return Some(maintenance_asset.clone());
    }
    config.target_url.clone().map(normalize_scheme)
}

fn normalize_scheme(url: Url) -> Url {
    match url.scheme() {
        "http" | "https" => url,
        scheme => {
            let rest = url.as_str()[scheme.len() + 1..].trim_start_matches('/');
            Url::parse(&format!("https://{rest}")).unwrap_or(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curtain() -> Url {
        Url::parse("file:///opt/managed-view/state/curtain.png").unwrap()
    }

    fn config_with_target(raw: &str) -> CanonicalConfig {
        CanonicalConfig {
            target_url: parse_lenient(raw),
            ..CanonicalConfig::default()
        }
    }

    #[test]
    fn test_maintenance_overrides_target() {
        let config = CanonicalConfig {
            maintenance_mode: true,
            ..config_with_target("https://kiosk.test/")
        };
        assert_eq!(effective_url(&config, &curtain()), Some(curtain()));
    }

    #[test]
    fn test_maintenance_overrides_absent_target() {
        let config = CanonicalConfig {
            maintenance_mode: true,
            target_url: None,
            ..CanonicalConfig::default()
        };
        assert_eq!(effective_url(&config, &curtain()), Some(curtain()));
    }

    #[test]
    fn test_absent_target_resolves_to_none() {
        let config = CanonicalConfig {
            target_url: None,
            ..CanonicalConfig::default()
        };
        assert_eq!(effective_url(&config, &curtain()), None);
    }

    #[test]
    fn test_schemeless_input_resolves_to_https() {
        let config = config_with_target("www.example.com/a/b?q=1");
        let url = effective_url(&config, &curtain()).unwrap();
        assert_eq!(url.as_str(), "https://www.example.com/a/b?q=1");
    }

    #[test]
    fn test_custom_scheme_rewritten_to_https() {
        let config = config_with_target("managedview://www.example.com/a/b?q=1");
        let url = effective_url(&config, &curtain()).unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("www.example.com"));
        assert_eq!(url.path(), "/a/b");
        assert_eq!(url.query(), Some("q=1"));
    }

    #[test]
    fn test_http_scheme_preserved() {
        let config = config_with_target("http://plain.test/page");
        let url = effective_url(&config, &curtain()).unwrap();
        assert_eq!(url.as_str(), "http://plain.test/page");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let config = config_with_target("managedview://www.example.com/");
        let first = effective_url(&config, &curtain());
        let second = effective_url(&config, &curtain());
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("   ").is_none());
        assert!(parse_lenient("http://[not-a-url").is_none());
    }
}
