//! Managed View - kiosk-mode controller for a managed embedded web view
//!
//! The behavior of the kiosk is driven entirely by externally-pushed
//! configuration snapshots: the [`config`] module reconciles each
//! snapshot into a canonical record, [`display`] derives the URL to show,
//! and the [`controller`] actor owns the session, lock, and navigation
//! state machines. Platform facilities (the web view itself, the
//! single-app-lock subsystem, storage purge) sit behind the traits in
//! [`platform`].

pub mod config;
pub mod controller;
pub mod display;
pub mod entity;
pub mod paths;
pub mod platform;

pub use config::{CanonicalConfig, ConfigSnapshot};
pub use controller::{Controller, ControllerHandle, ReconcileCause};
