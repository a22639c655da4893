//! Controller actor - owns all kiosk runtime state
//!
//! The controller is the single logical owner of the canonical
//! configuration, the render-surface slot, the lock state machine, and
//! the session lifecycle. It processes commands sequentially from a
//! channel; every asynchronous completion (lock toggle, storage purge,
//! navigation, timer) is marshaled back here as a command before it
//! touches state. This design:
//! - Eliminates lock contention by serializing all state access
//! - Keeps the re-entrancy guards of the lock and session machines local
//! - Simplifies testing through message inspection

mod commands;
mod handle;
mod lock;
mod navigation;
mod reconcile;
mod session;

pub use commands::{ControllerCommand, Counters, ReconcileCause};
pub use handle::ControllerHandle;
pub use lock::LockState;


use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CanonicalConfig;
use crate::platform::{Platform, RenderSurface};

use lock::LockMachine;

/// Fixed backoff between attempts for a failing navigation.
pub const NAV_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Delay between displaying a suppress-substring URL and forcing the
/// lock off. Gives the page a beat to settle before the device unlocks.
pub const SUBSTRING_UNLOCK_DELAY: Duration = Duration::from_millis(500);

/// How long a storage purge may run before the home reload proceeds
/// without it.
pub const PURGE_GRACE: Duration = Duration::from_secs(1);

/// The render-surface slot.
///
/// Creation is asynchronous, so the slot is a small state machine: a
/// reconciliation arriving mid-creation marks `pending_reload` instead of
/// launching a second concurrent creation.
enum SurfaceSlot {
    Absent,
    Creating { pending_reload: bool },
    Ready(Arc<dyn RenderSurface>),
}

/// Actor owning all controller state.
pub struct Controller {
    /// The live canonical configuration record, replaced atomically on
    /// each reconciliation.
    config: CanonicalConfig,
    /// `file://` URL of the materialized maintenance curtain.
    maintenance_url: Url,
    platform: Platform,

    /// Sender handed to spawned tasks so completions come back as commands.
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>,

    surface: SurfaceSlot,
    /// Invalidates stale `SurfaceCreated` completions after a teardown.
    surface_epoch: u64,
    /// Secondary (pop-up) surfaces, torn down on session reset.
    secondaries: Vec<Arc<dyn RenderSurface>>,

    lock: LockMachine,
    /// Operator-facing notice (e.g. lock capability absent).
    notice: Option<String>,

    /// Invalidates stale idle-deadline expiries; bumping it cancels the
    /// outstanding single-shot timer.
    idle_generation: u64,
    /// Invalidates stale navigation outcomes and pending retries.
    nav_epoch: u64,
    /// Target of the in-flight navigation, kept for retry.
    pending_nav: Option<Url>,

    counters: Counters,
}

impl Controller {
    /// Spawn the controller actor and return a handle for interacting
    /// with it.
    pub fn spawn(platform: Platform, maintenance_url: Url) -> ControllerHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let controller = Controller {
            config: CanonicalConfig::default(),
            maintenance_url,
            platform,
            cmd_tx: cmd_tx.clone(),
            cmd_rx,
            surface: SurfaceSlot::Absent,
            surface_epoch: 0,
            secondaries: Vec::new(),
            lock: LockMachine::new(),
            notice: None,
            idle_generation: 0,
            nav_epoch: 0,
            pending_nav: None,
            counters: Counters::default(),
        };

        tokio::spawn(controller.run());

        info!("Controller spawned");

        ControllerHandle::new(cmd_tx)
    }

    /// Main run loop. Processes commands until the channel closes or a
    /// shutdown command arrives.
    async fn run(mut self) {
        debug!("Controller run loop started");

        while let Some(cmd) = self.cmd_rx.recv().await {
            debug!(?cmd, "Processing command");

            match cmd {
                ControllerCommand::ApplySnapshot { snapshot, cause } => {
                    self.handle_apply_snapshot(snapshot, cause);
                }
                ControllerCommand::Foregrounded => self.handle_foregrounded(),
                ControllerCommand::QrScan { raw } => self.handle_qr_scan(&raw),
                ControllerCommand::Activity => self.handle_activity(),
                ControllerCommand::PopupRequested { url, main_frame } => {
                    self.handle_popup_requested(url, main_frame);
                }
                ControllerCommand::TrustChallenge { host, response } => {
                    let _ = response.send(self.handle_trust_challenge(&host));
                }

                ControllerCommand::SurfaceCreated { epoch, result } => {
                    self.handle_surface_created(epoch, result);
                }
                ControllerCommand::SecondaryCreated { surface } => {
                    if let Some(surface) = surface {
                        self.secondaries.push(surface);
                    }
                }
                ControllerCommand::NavigationOutcome { epoch, url, result } => {
                    self.handle_navigation_outcome(epoch, url, result);
                }
                ControllerCommand::RetryNavigation { epoch } => {
                    self.handle_retry_navigation(epoch);
                }
                ControllerCommand::LockResult { enable, success } => {
                    self.handle_lock_result(enable, success);
                }
                ControllerCommand::ForceUnlockDue => self.handle_force_unlock_due(),
                ControllerCommand::PurgeFinished => self.handle_purge_finished(),
                ControllerCommand::IdleExpired { generation } => {
                    self.handle_idle_expired(generation);
                }
                ControllerCommand::BootNavigate => {
                    info!("Launch delay elapsed, issuing initial navigation");
                    self.request_navigation(false);
                }

                ControllerCommand::GetConfig { response } => {
                    let _ = response.send(self.config.clone());
                }
                ControllerCommand::GetLockState { response } => {
                    let _ = response.send(self.lock.state);
                }
                ControllerCommand::GetNotice { response } => {
                    let _ = response.send(self.notice.clone());
                }
                ControllerCommand::GetCounters { response } => {
                    let _ = response.send(self.counters);
                }
                ControllerCommand::GetSecondaryCount { response } => {
                    let _ = response.send(self.secondaries.len());
                }

                ControllerCommand::Shutdown => {
                    info!("Controller received shutdown command");
                    break;
                }
            }
        }

        // Cancel everything bound to the surfaces before exiting.
        if let SurfaceSlot::Ready(surface) = &self.surface {
            let surface = surface.clone();
            tokio::spawn(async move { surface.close().await });
        }
        for surface in self.secondaries.drain(..) {
            tokio::spawn(async move { surface.close().await });
        }

        info!("Controller run loop terminated");
    }

    /// App returned to foreground: deep-link re-check only.
    fn handle_foregrounded(&mut self) {
        match self.platform.deep_links.take_pending() {
            Some(url) => {
                info!(%url, "Consuming pending deep link");
                self.config.target_url = Some(url);
                self.request_navigation(false);
            }
            None => debug!("No pending deep link"),
        }
    }

    /// QR scans are one-shot navigation requests, gated by `QR_CODE`.
    fn handle_qr_scan(&mut self, raw: &str) {
        if !self.config.qr_enabled {
            debug!(raw, "Ignoring QR scan (QR_CODE is OFF)");
            return;
        }
        match crate::display::parse_lenient(raw) {
            Some(url) => {
                info!(%url, "Navigating to scanned URL");
                self.config.target_url = Some(url);
                self.request_navigation(false);
            }
            None => warn!(raw, "Discarding unparseable QR scan"),
        }
    }
}
