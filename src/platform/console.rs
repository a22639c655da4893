//! Console platform - logs all platform calls for testing and development
//!
//! Stands in for the real embedded web view, lock subsystem, and storage
//! purge when running without a device. Useful for:
//! - Exercising the reconciler and state machines end to end
//! - Debugging configuration snapshots
//! - Development without platform dependencies

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::{
    DeepLinkSource, LockSubsystem, Platform, RenderSurface, StoragePurger, SurfaceFactory,
};

/// Render surface that logs navigations and always succeeds.
pub struct ConsoleSurface {
    id: u64,
    privacy: bool,
    /// Last URL dispatched to this surface
    last_loaded: Mutex<Option<Url>>,
}

impl ConsoleSurface {
    pub fn last_loaded(&self) -> Option<Url> {
        self.last_loaded.lock().clone()
    }
}

#[async_trait]
impl RenderSurface for ConsoleSurface {
    fn privacy(&self) -> bool {
        self.privacy
    }

    async fn load(&self, url: &Url) -> Result<()> {
        info!(surface = self.id, privacy = self.privacy, %url, "🌐 surface load");
        *self.last_loaded.lock() = Some(url.clone());
        Ok(())
    }

    async fn close(&self) {
        info!(surface = self.id, "surface closed");
    }
}

/// Factory producing [`ConsoleSurface`] instances.
#[derive(Default)]
pub struct ConsoleSurfaceFactory {
    created: AtomicU64,
}

impl ConsoleSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of surfaces created so far.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SurfaceFactory for ConsoleSurfaceFactory {
    async fn create(&self, privacy_mode: bool) -> Result<Arc<dyn RenderSurface>> {
        let id = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        info!(surface = id, privacy = privacy_mode, "🪟 creating render surface");
        Ok(Arc::new(ConsoleSurface {
            id,
            privacy: privacy_mode,
            last_loaded: Mutex::new(None),
        }))
    }
}

/// Lock subsystem that reports a fixed capability.
pub struct ConsoleLock {
    capable: bool,
    /// Confirmed lock state, mirrors what a real device would report
    engaged: Mutex<bool>,
}

impl ConsoleLock {
    pub fn new(capable: bool) -> Self {
        Self {
            capable,
            engaged: Mutex::new(false),
        }
    }

    pub fn engaged(&self) -> bool {
        *self.engaged.lock()
    }
}

#[async_trait]
impl LockSubsystem for ConsoleLock {
    async fn request_lock(&self, enable: bool) -> bool {
        if !self.capable {
            info!(enable, "🔒 lock request refused (capability absent)");
            return false;
        }
        *self.engaged.lock() = enable;
        info!(enable, "🔒 lock request honored");
        true
    }
}

/// Storage purger that logs and succeeds.
#[derive(Default)]
pub struct ConsolePurger {
    purge_count: AtomicU64,
}

impl ConsolePurger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purge_count(&self) -> u64 {
        self.purge_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StoragePurger for ConsolePurger {
    async fn purge_all(&self) -> Result<()> {
        let n = self.purge_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(purge = n, "🧹 purging session storage");
        Ok(())
    }
}

/// Deep-link source with a settable pending URL.
#[derive(Default)]
pub struct ConsoleDeepLinks {
    pending: Mutex<Option<Url>>,
}

impl ConsoleDeepLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pending(&self, url: Url) {
        *self.pending.lock() = Some(url);
    }
}

impl DeepLinkSource for ConsoleDeepLinks {
    fn take_pending(&self) -> Option<Url> {
        self.pending.lock().take()
    }
}

/// Fully console-backed platform bundle for the binary's default mode.
pub struct ConsolePlatform;

impl ConsolePlatform {
    pub fn bundle(lock_capable: bool) -> Platform {
        Platform {
            surfaces: Arc::new(ConsoleSurfaceFactory::new()),
            lock: Arc::new(ConsoleLock::new(lock_capable)),
            purger: Arc::new(ConsolePurger::new()),
            deep_links: Arc::new(ConsoleDeepLinks::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_surface_records_loads() {
        let factory = ConsoleSurfaceFactory::new();
        let surface = factory.create(false).await.unwrap();
        assert!(!surface.privacy());

        let url = Url::parse("https://kiosk.test/").unwrap();
        surface.load(&url).await.unwrap();
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test]
    async fn test_console_lock_capability() {
        let capable = ConsoleLock::new(true);
        assert!(capable.request_lock(true).await);
        assert!(capable.engaged());
        assert!(capable.request_lock(false).await);
        assert!(!capable.engaged());

        let incapable = ConsoleLock::new(false);
        assert!(!incapable.request_lock(true).await);
        assert!(!incapable.engaged());
    }

    #[test]
    fn test_deep_link_consumed_once() {
        let links = ConsoleDeepLinks::new();
        links.set_pending(Url::parse("https://deep.test/").unwrap());
        assert!(links.take_pending().is_some());
        assert!(links.take_pending().is_none());
    }
}
