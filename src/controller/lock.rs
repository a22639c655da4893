//! Lock state machine
//!
//! Drives the device single-app-lock subsystem toward the configured
//! target state. The toggle request is asynchronous and can fail, so the
//! machine tracks desired vs. confirmed state explicitly and guards
//! re-entrancy: while a request is in flight, a flip of the desired
//! target is queued and only the most recent target is honored once the
//! in-flight request resolves.

use tracing::{debug, info, warn};

use super::{Controller, ControllerCommand};

/// Notice surfaced when the lock subsystem reports it cannot engage
/// (device not supervised, profile missing).
pub const LOCK_UNAVAILABLE_NOTICE: &str =
    "Single-app lock is not supported on this device (supervision or configuration profile missing)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    LockPending,
    Locked,
    UnlockPending,
}

pub(super) struct LockMachine {
    pub state: LockState,
    /// Target queued while a request is in flight; latest wins.
    queued_target: Option<bool>,
    /// Raised during a substring-triggered unlock window to keep
    /// reconciliation from fighting the forced unlock.
    pub block_lock: bool,
}

impl LockMachine {
    pub fn new() -> Self {
        Self {
            state: LockState::Unlocked,
            queued_target: None,
            block_lock: false,
        }
    }
}

impl Controller {
    /// Drive the machine toward `desired`. Called once per
    /// reconciliation pass when the target changed, and on re-evaluation
    /// after an unlock window closes.
    pub(super) fn drive_lock(&mut self, desired: bool) {
        if desired && self.lock.block_lock {
            debug!("Lock request suppressed (substring unlock window active)");
            return;
        }

        match (self.lock.state, desired) {
            (LockState::Unlocked, true) => self.issue_lock_request(true),
            (LockState::Locked, false) => self.issue_lock_request(false),
            (LockState::LockPending, _) | (LockState::UnlockPending, _) => {
                debug!(desired, "Toggle in flight, queueing latest target");
                self.lock.queued_target = Some(desired);
            }
            // Already satisfied
            (LockState::Locked, true) | (LockState::Unlocked, false) => {}
        }
    }

    /// Force the lock off regardless of the configured target
    /// (substring-triggered unlock).
    pub(super) fn force_unlock(&mut self) {
        match self.lock.state {
            LockState::Locked => self.issue_lock_request(false),
            LockState::LockPending => {
                self.lock.queued_target = Some(false);
            }
            LockState::Unlocked | LockState::UnlockPending => {}
        }
    }

    fn issue_lock_request(&mut self, enable: bool) {
        self.lock.state = if enable {
            LockState::LockPending
        } else {
            LockState::UnlockPending
        };
        self.counters.lock_requests += 1;

        info!(enable, "Requesting single-app lock toggle");

        let lock = self.platform.lock.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let success = lock.request_lock(enable).await;
            let _ = tx.send(ControllerCommand::LockResult { enable, success });
        });
    }

    pub(super) fn handle_lock_result(&mut self, enable: bool, success: bool) {
        match (enable, success) {
            (true, true) => {
                info!("Single-app lock engaged");
                self.lock.state = LockState::Locked;
                self.config.lock_observed = true;
            }
            (true, false) => {
                // Terminal for this attempt: the controller stays
                // unlocked until something re-drives the target.
                warn!("Single-app lock request refused");
                self.lock.state = LockState::Unlocked;
                self.config.lock_observed = false;
                self.notice = Some(LOCK_UNAVAILABLE_NOTICE.to_string());
            }
            (false, true) => {
                info!("Single-app lock released");
                self.lock.state = LockState::Unlocked;
                self.config.lock_observed = false;
            }
            (false, false) => {
                warn!("Single-app lock release refused");
                self.lock.state = LockState::Locked;
            }
        }

        if let Some(queued) = self.lock.queued_target.take() {
            self.drive_lock(queued);
        }
    }

    /// Substring-unlock delay elapsed: force the unlock if the window is
    /// still open.
    pub(super) fn handle_force_unlock_due(&mut self) {
        if self.lock.block_lock {
            info!("Forcing single-app lock off (suppress substring matched)");
            self.force_unlock();
        }
    }
}
