//! Session lifecycle: idle-reset deadline and the purge-and-reload
//! sequence
//!
//! The idle deadline is a single-shot timer modeled as a generation
//! counter: arming bumps the generation and spawns a sleep that reports
//! back with the generation it was armed under; a stale generation on
//! expiry means the timer was rescheduled or cancelled in the meantime.

use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::{Controller, ControllerCommand, PURGE_GRACE, SUBSTRING_UNLOCK_DELAY};

impl Controller {
    /// Re-arm the idle deadline to now + `RESET_TIMER` seconds.
    pub(super) fn arm_idle(&mut self) {
        if self.config.idle_reset_seconds == 0 {
            return;
        }
        // Disarmed entirely while nothing or the home URL is displayed.
        if self.config.previous_url.is_none() || self.showing_home() {
            return;
        }

        self.idle_generation += 1;
        let generation = self.idle_generation;
        let secs = self.config.idle_reset_seconds;
        let tx = self.cmd_tx.clone();

        debug!(generation, secs, "Arming idle-reset deadline");
        tokio::spawn(async move {
            sleep(std::time::Duration::from_secs(secs)).await;
            let _ = tx.send(ControllerCommand::IdleExpired { generation });
        });
    }

    pub(super) fn cancel_idle(&mut self) {
        self.idle_generation += 1;
    }

    fn showing_home(&self) -> bool {
        match (&self.config.previous_url, &self.config.home_url) {
            (Some(previous), Some(home)) => previous == home,
            _ => false,
        }
    }

    /// User activity on the surface re-arms the deadline when
    /// `RESET_ON_SCROLL` is ON.
    pub(super) fn handle_activity(&mut self) {
        if self.config.reset_on_scroll {
            self.arm_idle();
        }
    }

    pub(super) fn handle_idle_expired(&mut self, generation: u64) {
        if generation != self.idle_generation {
            debug!(generation, "Ignoring stale idle deadline");
            return;
        }
        info!("Idle deadline expired, resetting session");
        self.reset_session();
    }

    /// Purge session-scoped state, then reload the home URL.
    ///
    /// The home navigation is scheduled strictly after the purge
    /// completes (or after the grace period if the purge hangs) so the
    /// reload cannot repopulate storage the purge is still clearing.
    pub(super) fn reset_session(&mut self) {
        self.cancel_idle();
        self.counters.session_resets += 1;

        for surface in self.secondaries.drain(..) {
            tokio::spawn(async move { surface.close().await });
        }

        let purger = self.platform.purger.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(PURGE_GRACE, purger.purge_all()).await {
                Ok(Ok(())) => debug!("Session storage purged"),
                Ok(Err(e)) => warn!("Storage purge failed (reloading anyway): {e:#}"),
                Err(_) => warn!("Storage purge exceeded grace period, reloading anyway"),
            }
            let _ = tx.send(ControllerCommand::PurgeFinished);
        });
    }

    pub(super) fn handle_purge_finished(&mut self) {
        // The purge cleared in-page state, so the home load is forced
        // even if home is already displayed.
        self.config.target_url = self.config.home_url.clone();
        self.config.previous_url = None;
        self.request_navigation(false);
    }

    /// Bookkeeping run on every successful navigation.
    pub(super) fn on_navigation_complete(&mut self, url: &Url) {
        if self.config.browser_mode {
            // Address-field reflection for the interactive chrome.
            info!(address = %url, locked = self.config.browser_mode_locked, "Address field updated");
        }

        if self.showing_home() {
            self.cancel_idle();
        } else {
            self.arm_idle();
        }

        self.evaluate_suppress_substring(url);
    }

    /// Substring-triggered unlock: displaying a URL that contains the
    /// operator-defined marker forces the lock off after a short delay
    /// and blocks lock retries for the duration of the window.
    fn evaluate_suppress_substring(&mut self, url: &Url) {
        let marker = &self.config.lock_suppress_substring;
        if !marker.is_empty() && url.as_str().contains(marker.as_str()) {
            if !self.lock.block_lock {
                info!(marker = %marker, "Suppress substring matched, opening unlock window");
                self.lock.block_lock = true;
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    sleep(SUBSTRING_UNLOCK_DELAY).await;
                    let _ = tx.send(ControllerCommand::ForceUnlockDue);
                });
            }
        } else if self.lock.block_lock {
            info!("Suppress substring no longer matched, resuming lock enforcement");
            self.lock.block_lock = false;
            self.drive_lock(self.config.lock_target);
        }
    }

    /// Whether a configuration-changed notification should be dropped
    /// because a substring-triggered unlock is in progress.
    pub(super) fn suppress_window_active(&self) -> bool {
        let marker = &self.config.lock_suppress_substring;
        !marker.is_empty()
            && self
                .config
                .previous_url
                .as_ref()
                .is_some_and(|u| u.as_str().contains(marker.as_str()))
    }
}
