//! ControllerHandle - public API for the controller actor
//!
//! Wraps message passing with ergonomic methods: fire-and-forget sends
//! for events, async methods with oneshot channels for queries. All
//! methods are non-blocking for the caller.

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::config::{CanonicalConfig, ConfigSnapshot};
use crate::platform::TrustDecision;

use super::commands::{ControllerCommand, Counters, ReconcileCause};
use super::lock::LockState;

/// Handle for interacting with the controller actor.
#[derive(Clone)]
pub struct ControllerHandle {
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
}

impl ControllerHandle {
    pub(super) fn new(cmd_tx: mpsc::UnboundedSender<ControllerCommand>) -> Self {
        Self { cmd_tx }
    }

    // =========================================================================
    // Event methods (fire-and-forget)
    // =========================================================================

    /// Deliver a configuration snapshot.
    pub fn apply_snapshot(&self, snapshot: ConfigSnapshot, cause: ReconcileCause) {
        let _ = self
            .cmd_tx
            .send(ControllerCommand::ApplySnapshot { snapshot, cause });
    }

    /// App returned to foreground (deep-link re-check only).
    pub fn foregrounded(&self) {
        let _ = self.cmd_tx.send(ControllerCommand::Foregrounded);
    }

    /// QR scanner produced a URL string.
    pub fn qr_scan(&self, raw: impl Into<String>) {
        let _ = self.cmd_tx.send(ControllerCommand::QrScan { raw: raw.into() });
    }

    /// User activity (scroll/touch) on the render surface.
    pub fn activity(&self) {
        let _ = self.cmd_tx.send(ControllerCommand::Activity);
    }

    /// The surface asked to open an auxiliary surface.
    pub fn popup_requested(&self, url: Url, main_frame: bool) {
        let _ = self
            .cmd_tx
            .send(ControllerCommand::PopupRequested { url, main_frame });
    }

    /// Ask the controller to shut down.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(ControllerCommand::Shutdown);
    }

    // =========================================================================
    // Query methods (async with response)
    // =========================================================================

    /// Resolve a server-trust challenge per the configured policy.
    ///
    /// Falls back to default platform validation if the controller is
    /// gone.
    pub async fn trust_challenge(&self, host: impl Into<String>) -> TrustDecision {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = ControllerCommand::TrustChallenge {
            host: host.into(),
            response: response_tx,
        };
        if self.cmd_tx.send(cmd).is_err() {
            return TrustDecision::UseDefault;
        }
        response_rx.await.unwrap_or(TrustDecision::UseDefault)
    }

    /// Current canonical configuration record.
    pub async fn config(&self) -> CanonicalConfig {
        self.query(|response| ControllerCommand::GetConfig { response })
            .await
            .unwrap_or_default()
    }

    /// Current lock state machine state.
    pub async fn lock_state(&self) -> LockState {
        self.query(|response| ControllerCommand::GetLockState { response })
            .await
            .unwrap_or(LockState::Unlocked)
    }

    /// Operator-facing notice, if any.
    pub async fn notice(&self) -> Option<String> {
        self.query(|response| ControllerCommand::GetNotice { response })
            .await
            .flatten()
    }

    /// Side-effect counters.
    pub async fn counters(&self) -> Counters {
        self.query(|response| ControllerCommand::GetCounters { response })
            .await
            .unwrap_or_default()
    }

    /// Number of tracked secondary surfaces.
    pub async fn secondary_count(&self) -> usize {
        self.query(|response| ControllerCommand::GetSecondaryCount { response })
            .await
            .unwrap_or(0)
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControllerCommand,
    ) -> Option<T> {
        let (response_tx, response_rx) = oneshot::channel();
        if self.cmd_tx.send(make(response_tx)).is_err() {
            return None;
        }
        response_rx.await.ok()
    }
}
