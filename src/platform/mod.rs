//! External collaborator traits (render surface, lock subsystem, storage purge)
//!
//! The controller never talks to platform facilities directly; it drives
//! them through these traits so the binary can wire real integrations and
//! tests can wire mocks.
//!
//! Note: All methods take &self (not &mut self) to support Arc<dyn …>.
//! Implementations should use interior mutability for mutable state.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Response to a server-trust authentication challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// Accept the presented certificate unconditionally.
    AcceptAnyway,
    /// Defer to default platform validation.
    UseDefault,
}

/// An embedded web-content view instance.
///
/// Surfaces are created by a [`SurfaceFactory`] and are either persistent
/// or privacy-partitioned; switching partitions means tearing the surface
/// down and creating a new one.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Whether this surface uses a non-persistent storage partition.
    fn privacy(&self) -> bool;

    /// Issue a navigation. Resolves when the provisional navigation
    /// completes; a transport failure (no connectivity, DNS, TLS) is an
    /// `Err` and is retried by the supervisor.
    async fn load(&self, url: &Url) -> Result<()>;

    /// Tear the surface down, cancelling any in-flight work bound to it.
    async fn close(&self);
}

/// Creates render surfaces for a given storage partition kind.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&self, privacy_mode: bool) -> Result<Arc<dyn RenderSurface>>;
}

/// The OS single-app-lock subsystem (ASAM / Guided Access).
#[async_trait]
pub trait LockSubsystem: Send + Sync {
    /// Request the lock be toggled. The returned flag is the subsystem's
    /// success indication; `false` covers both refusal and missing
    /// capability (unsupervised device, no profile).
    async fn request_lock(&self, enable: bool) -> bool;
}

/// Session-scoped storage purge (cookies, local/session storage, cache,
/// stored credentials).
#[async_trait]
pub trait StoragePurger: Send + Sync {
    /// Best-effort purge of everything reachable by the render surface.
    async fn purge_all(&self) -> Result<()>;
}

/// Host-OS deep-link delivery. Consumed once at boot/foreground and
/// cleared after consumption.
pub trait DeepLinkSource: Send + Sync {
    fn take_pending(&self) -> Option<Url>;
}

/// Bundle of platform collaborators handed to the controller at spawn.
#[derive(Clone)]
pub struct Platform {
    pub surfaces: Arc<dyn SurfaceFactory>,
    pub lock: Arc<dyn LockSubsystem>,
    pub purger: Arc<dyn StoragePurger>,
    pub deep_links: Arc<dyn DeepLinkSource>,
}

pub mod console;

pub use console::{ConsoleLock, ConsolePlatform, ConsolePurger, ConsoleSurfaceFactory};
