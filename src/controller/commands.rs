//! Command enum for the controller actor
//!
//! Everything that touches controller state arrives as one of these
//! commands: external events (snapshot deliveries, QR scans, deep-link
//! rechecks), asynchronous completions marshaled back from spawned tasks
//! (lock results, navigation outcomes, timer expiries), and
//! request-response queries answered over oneshot channels.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

use crate::config::{CanonicalConfig, ConfigSnapshot};
use crate::controller::lock::LockState;
use crate::platform::{RenderSurface, TrustDecision};

/// Why a snapshot is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileCause {
    /// Initial snapshot at boot. Honors `DELAY_LAUNCH` for the first
    /// navigation and consumes a pending deep link.
    Boot,
    /// Configuration-changed notification. Ignored while the listener is
    /// disabled or a substring-triggered unlock window is active.
    ConfigChanged,
}

/// Counters for externally-observable side effects.
///
/// Queryable so tests can assert idempotency (no duplicate navigation,
/// lock request, or surface creation for an unchanged snapshot).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub loads_issued: u64,
    pub lock_requests: u64,
    pub surface_creations: u64,
    pub session_resets: u64,
}

pub enum ControllerCommand {
    // -------------------------------------------------------------------------
    // External events
    // -------------------------------------------------------------------------
    /// Apply a configuration snapshot.
    ApplySnapshot {
        snapshot: ConfigSnapshot,
        cause: ReconcileCause,
    },

    /// App returned to foreground: re-check the deep-link collaborator
    /// only, no full reconciliation.
    Foregrounded,

    /// QR scanner emitted a URL string.
    QrScan { raw: String },

    /// User activity (scroll/touch) detected on the render surface.
    Activity,

    /// The surface asked to open an auxiliary surface / new tab.
    /// `main_frame` is false for requests targeting no frame.
    PopupRequested { url: Url, main_frame: bool },

    /// Server-trust authentication challenge from the surface.
    TrustChallenge {
        host: String,
        response: oneshot::Sender<TrustDecision>,
    },

    // -------------------------------------------------------------------------
    // Asynchronous completions (sent by tasks the controller spawned)
    // -------------------------------------------------------------------------
    /// Render surface creation finished.
    SurfaceCreated {
        epoch: u64,
        result: Result<Arc<dyn RenderSurface>>,
    },

    /// A secondary (pop-up) surface finished creation.
    SecondaryCreated {
        surface: Option<Arc<dyn RenderSurface>>,
    },

    /// A navigation resolved.
    NavigationOutcome {
        epoch: u64,
        url: Url,
        result: Result<()>,
    },

    /// Retry backoff for a failed navigation elapsed.
    RetryNavigation { epoch: u64 },

    /// The lock subsystem answered a toggle request.
    LockResult { enable: bool, success: bool },

    /// Substring-unlock delay elapsed.
    ForceUnlockDue,

    /// Storage purge completed (or its grace period elapsed).
    PurgeFinished,

    /// Idle deadline fired.
    IdleExpired { generation: u64 },

    /// Launch delay elapsed; issue the initial navigation.
    BootNavigate,

    // -------------------------------------------------------------------------
    // Request-response queries
    // -------------------------------------------------------------------------
    GetConfig {
        response: oneshot::Sender<CanonicalConfig>,
    },
    GetLockState {
        response: oneshot::Sender<LockState>,
    },
    GetNotice {
        response: oneshot::Sender<Option<String>>,
    },
    GetCounters {
        response: oneshot::Sender<Counters>,
    },
    GetSecondaryCount {
        response: oneshot::Sender<usize>,
    },

    /// Gracefully shut down the controller actor.
    Shutdown,
}

// Manual Debug implementation because trait objects and response channels
// don't implement Debug
impl std::fmt::Debug for ControllerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerCommand::ApplySnapshot { snapshot, cause } => f
                .debug_struct("ApplySnapshot")
                .field("keys", &snapshot.len())
                .field("cause", cause)
                .finish(),
            ControllerCommand::Foregrounded => write!(f, "Foregrounded"),
            ControllerCommand::QrScan { raw } => {
                f.debug_struct("QrScan").field("raw", raw).finish()
            }
            ControllerCommand::Activity => write!(f, "Activity"),
            ControllerCommand::PopupRequested { url, main_frame } => f
                .debug_struct("PopupRequested")
                .field("url", url)
                .field("main_frame", main_frame)
                .finish(),
            ControllerCommand::TrustChallenge { host, .. } => f
                .debug_struct("TrustChallenge")
                .field("host", host)
                .finish_non_exhaustive(),
            ControllerCommand::SurfaceCreated { epoch, result } => f
                .debug_struct("SurfaceCreated")
                .field("epoch", epoch)
                .field("ok", &result.is_ok())
                .finish(),
            ControllerCommand::SecondaryCreated { surface } => f
                .debug_struct("SecondaryCreated")
                .field("ok", &surface.is_some())
                .finish(),
            ControllerCommand::NavigationOutcome { epoch, url, result } => f
                .debug_struct("NavigationOutcome")
                .field("epoch", epoch)
                .field("url", url)
                .field("ok", &result.is_ok())
                .finish(),
            ControllerCommand::RetryNavigation { epoch } => f
                .debug_struct("RetryNavigation")
                .field("epoch", epoch)
                .finish(),
            ControllerCommand::LockResult { enable, success } => f
                .debug_struct("LockResult")
                .field("enable", enable)
                .field("success", success)
                .finish(),
            ControllerCommand::ForceUnlockDue => write!(f, "ForceUnlockDue"),
            ControllerCommand::PurgeFinished => write!(f, "PurgeFinished"),
            ControllerCommand::IdleExpired { generation } => f
                .debug_struct("IdleExpired")
                .field("generation", generation)
                .finish(),
            ControllerCommand::BootNavigate => write!(f, "BootNavigate"),
            ControllerCommand::GetConfig { .. } => {
                f.debug_struct("GetConfig").finish_non_exhaustive()
            }
            ControllerCommand::GetLockState { .. } => {
                f.debug_struct("GetLockState").finish_non_exhaustive()
            }
            ControllerCommand::GetNotice { .. } => {
                f.debug_struct("GetNotice").finish_non_exhaustive()
            }
            ControllerCommand::GetCounters { .. } => {
                f.debug_struct("GetCounters").finish_non_exhaustive()
            }
            ControllerCommand::GetSecondaryCount { .. } => {
                f.debug_struct("GetSecondaryCount").finish_non_exhaustive()
            }
            ControllerCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
