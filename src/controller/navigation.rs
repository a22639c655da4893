//! Load/navigation supervision and render-surface lifecycle
//!
//! Navigations are issued against the display policy's effective URL and
//! tracked by an epoch counter: a superseding load bumps the epoch, which
//! cancels the outstanding retry of the previous target. Failed loads are
//! retried at a fixed backoff, indefinitely, until they succeed or are
//! superseded.

use anyhow::Result;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::RedirectPolicy;
use crate::display;
use crate::platform::{RenderSurface, TrustDecision};

use super::{Controller, ControllerCommand, SurfaceSlot, NAV_RETRY_BACKOFF};

impl Controller {
    /// Make the display match the current configuration, creating or
    /// recreating the render surface first when required.
    ///
    /// `recreate` is set only when the storage partition changed
    /// (privacy mode); recreating unconditionally would drop in-page
    /// state and double-fire creation under concurrent reconciliation.
    pub(super) fn request_navigation(&mut self, recreate: bool) {
        match &mut self.surface {
            SurfaceSlot::Creating { pending_reload } => {
                // Honored once the in-flight creation completes.
                debug!("Surface creation in flight, marking pending reload");
                *pending_reload = true;
            }
            SurfaceSlot::Absent => self.begin_surface_creation(),
            SurfaceSlot::Ready(surface) => {
                if recreate {
                    let old = surface.clone();
                    tokio::spawn(async move { old.close().await });
                    self.begin_surface_creation();
                } else {
                    self.navigate_if_changed();
                }
            }
        }
    }

    fn begin_surface_creation(&mut self) {
        self.surface_epoch += 1;
        let epoch = self.surface_epoch;
        self.surface = SurfaceSlot::Creating {
            pending_reload: false,
        };

        // Tearing down a surface cancels the continuations bound to it.
        self.nav_epoch += 1;
        self.pending_nav = None;
        // Nothing is displayed on the new surface yet.
        self.config.previous_url = None;

        self.counters.surface_creations += 1;

        let factory = self.platform.surfaces.clone();
        let privacy = self.config.privacy_mode;
        let tx = self.cmd_tx.clone();
        info!(privacy, "Creating render surface");
        tokio::spawn(async move {
            let result = factory.create(privacy).await;
            let _ = tx.send(ControllerCommand::SurfaceCreated { epoch, result });
        });
    }

    pub(super) fn handle_surface_created(
        &mut self,
        epoch: u64,
        result: Result<Arc<dyn RenderSurface>>,
    ) {
        if epoch != self.surface_epoch {
            debug!(epoch, "Discarding stale surface creation");
            if let Ok(surface) = result {
                tokio::spawn(async move { surface.close().await });
            }
            return;
        }

        let pending_reload = matches!(self.surface, SurfaceSlot::Creating { pending_reload: true });

        match result {
            Ok(surface) => {
                // A reconciliation that arrived mid-creation may have
                // switched partitions; honor it now instead of keeping a
                // surface on the wrong one.
                if surface.privacy() != self.config.privacy_mode {
                    debug!("Partition changed during creation, recreating surface");
                    tokio::spawn(async move { surface.close().await });
                    self.begin_surface_creation();
                    return;
                }
                self.surface = SurfaceSlot::Ready(surface);
                debug!(pending_reload, "Render surface ready");
                self.navigate_if_changed();
            }
            Err(e) => {
                error!("Render surface creation failed: {e:#}");
                self.surface = SurfaceSlot::Absent;
            }
        }
    }

    /// Issue a navigation when the effective URL differs from what the
    /// surface last received. Repeated calls with no change are no-ops.
    pub(super) fn navigate_if_changed(&mut self) {
        let effective = match display::effective_url(&self.config, &self.maintenance_url) {
            Some(url) => url,
            None => {
                debug!("No display target resolved");
                return;
            }
        };
        if self.config.previous_url.as_ref() == Some(&effective) {
            debug!(%effective, "Display target unchanged, skipping load");
            return;
        }
        self.issue_load(effective);
    }

    fn issue_load(&mut self, url: Url) {
        let surface = match &self.surface {
            SurfaceSlot::Ready(surface) => surface.clone(),
            _ => {
                debug!("No surface ready for load");
                return;
            }
        };

        // Supersedes the previous target: its pending retry goes stale.
        self.nav_epoch += 1;
        let epoch = self.nav_epoch;
        self.config.previous_url = Some(url.clone());
        self.pending_nav = Some(url.clone());
        self.counters.loads_issued += 1;

        info!(%url, "Loading");
        self.spawn_load(surface, url, epoch);
    }

    fn spawn_load(&self, surface: Arc<dyn RenderSurface>, url: Url, epoch: u64) {
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = surface.load(&url).await;
            let _ = tx.send(ControllerCommand::NavigationOutcome { epoch, url, result });
        });
    }

    pub(super) fn handle_navigation_outcome(&mut self, epoch: u64, url: Url, result: Result<()>) {
        if epoch != self.nav_epoch {
            debug!(%url, "Ignoring outcome of superseded navigation");
            return;
        }

        match result {
            Ok(()) => {
                debug!(%url, "Navigation complete");
                self.pending_nav = None;
                self.on_navigation_complete(&url);
            }
            Err(e) => {
                warn!(%url, backoff = ?NAV_RETRY_BACKOFF, "Navigation failed, will retry: {e:#}");
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    sleep(NAV_RETRY_BACKOFF).await;
                    let _ = tx.send(ControllerCommand::RetryNavigation { epoch });
                });
            }
        }
    }

    pub(super) fn handle_retry_navigation(&mut self, epoch: u64) {
        if epoch != self.nav_epoch {
            debug!("Retry cancelled, target was superseded");
            return;
        }
        let url = match &self.pending_nav {
            Some(url) => url.clone(),
            None => return,
        };
        let surface = match &self.surface {
            SurfaceSlot::Ready(surface) => surface.clone(),
            _ => return,
        };
        info!(%url, "Retrying navigation");
        self.spawn_load(surface, url, epoch);
    }

    /// Apply the pop-up/new-surface redirect policy.
    pub(super) fn handle_popup_requested(&mut self, url: Url, main_frame: bool) {
        match self.config.redirect_policy {
            RedirectPolicy::Off => {
                debug!(%url, "Ignoring auxiliary surface request (policy OFF)");
            }
            RedirectPolicy::Inline => {
                if !main_frame {
                    info!(%url, "Redirecting frameless navigation into current surface");
                    self.config.target_url = Some(url);
                    self.request_navigation(false);
                }
            }
            RedirectPolicy::NewSurface => {
                if main_frame {
                    return;
                }
                if !self.config.popup_auto_open {
                    debug!(%url, "Ignoring auxiliary surface request (POP_UP is OFF)");
                    return;
                }
                info!(%url, "Opening secondary render surface");
                let factory = self.platform.surfaces.clone();
                let privacy = self.config.privacy_mode;
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let surface = match factory.create(privacy).await {
                        Ok(surface) => surface,
                        Err(e) => {
                            warn!("Secondary surface creation failed: {e:#}");
                            let _ = tx.send(ControllerCommand::SecondaryCreated { surface: None });
                            return;
                        }
                    };
                    if let Err(e) = surface.load(&url).await {
                        warn!(%url, "Secondary surface load failed: {e:#}");
                    }
                    let _ = tx.send(ControllerCommand::SecondaryCreated {
                        surface: Some(surface),
                    });
                });
            }
        }
    }

    /// SSL trust policy for server-trust challenges.
    pub(super) fn handle_trust_challenge(&self, host: &str) -> TrustDecision {
        if self.config.trust_override {
            // Deliberate, explicit opt-in weakening; always logged.
            warn!(host, "SSL_TRUST override: accepting presented certificate");
            TrustDecision::AcceptAnyway
        } else {
            TrustDecision::UseDefault
        }
    }
}
