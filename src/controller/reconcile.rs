//! Snapshot application: swap in the new canonical record and apply the
//! side effects its diff against the old record demands.

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{self, ConfigSnapshot};

use super::{Controller, ControllerCommand, ReconcileCause};

impl Controller {
    pub(super) fn handle_apply_snapshot(
        &mut self,
        snapshot: ConfigSnapshot,
        cause: ReconcileCause,
    ) {
        if cause == ReconcileCause::ConfigChanged {
            if !self.config.config_listener_enabled {
                debug!("Dropping configuration change (CONFIG_LISTENER is OFF)");
                return;
            }
            // Reconciling now would fight the active substring-triggered
            // unlock; the next notification picks the change up.
            if self.suppress_window_active() {
                info!("Dropping configuration change during unlock window");
                return;
            }
        }

        let old = self.config.clone();
        self.config = config::reconcile(&old, &snapshot);
        info!(cause = ?cause, "Canonical configuration replaced");

        // Lock machine is driven at most once per reconciliation pass.
        if self.config.lock_target != old.lock_target {
            self.drive_lock(self.config.lock_target);
        }

        if self.config.idle_reset_seconds != old.idle_reset_seconds {
            self.cancel_idle();
            self.arm_idle();
        }

        // Switching storage partitions invalidates the surface; anything
        // else reuses it and only issues a fresh navigation.
        let recreate = self.config.privacy_mode != old.privacy_mode;

        match cause {
            ReconcileCause::Boot => {
                if let Some(url) = self.platform.deep_links.take_pending() {
                    info!(%url, "Consuming pending deep link at boot");
                    self.config.target_url = Some(url);
                }

                let delay = self.config.launch_delay_seconds;
                if delay > 0 {
                    info!(delay, "Postponing initial navigation (DELAY_LAUNCH)");
                    let tx = self.cmd_tx.clone();
                    tokio::spawn(async move {
                        sleep(std::time::Duration::from_secs(delay)).await;
                        let _ = tx.send(ControllerCommand::BootNavigate);
                    });
                } else {
                    self.request_navigation(recreate);
                }
            }
            ReconcileCause::ConfigChanged => self.request_navigation(recreate),
        }
    }
}
