//! Application path management for portable and installed modes.
//!
//! This module handles the detection and resolution of application paths
//! and the materialization of the bundled maintenance asset.
//!
//! ## Mode Detection
//!
//! - **Portable mode**: If a `.portable` marker file exists next to the
//!   executable, all data files are stored in the same directory. This
//!   requires the directory to be writable (not `C:\Program Files`).
//! - **Installed mode** (default): Data is stored in the platform data
//!   directory (`%APPDATA%\Managed View` or equivalent).

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Managed View";

/// Snapshot file name watched for configuration changes
const SNAPSHOT_FILE: &str = "managed-config.yaml";

/// Resources bundled into the binary.
///
/// Contains `img/curtain.png`, the maintenance-mode display target.
#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

/// Application paths for the snapshot file and state directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the managed configuration snapshot file
    pub snapshot: PathBuf,
    /// Path to the state directory (materialized assets)
    pub state_dir: PathBuf,
    /// Whether running in portable mode (snapshot next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// **Debug mode**: If the snapshot file exists in the current working
    /// directory (typical when running with `cargo run`), use that
    /// directory.
    ///
    /// **Portable mode**: If a `.portable` marker file exists next to the
    /// executable, all data files are stored in the same directory.
    ///
    /// **Installed mode** (default): Data is stored in the platform data
    /// directory.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let cwd_snapshot = cwd.join(SNAPSHOT_FILE);
            if cwd_snapshot.exists() {
                eprintln!(
                    "[paths] Running in DEV mode ({} found in cwd: {})",
                    SNAPSHOT_FILE,
                    cwd.display()
                );
                return Self {
                    snapshot: cwd_snapshot,
                    state_dir: cwd.join(".state"),
                    is_portable: true,
                };
            }
        }

        let portable_marker = exe_dir.join(".portable");

        if portable_marker.exists() {
            Self {
                snapshot: exe_dir.join(SNAPSHOT_FILE),
                state_dir: exe_dir.join(".state"),
                is_portable: true,
            }
        } else {
            let app_data = dirs::data_dir()
                .unwrap_or_else(|| exe_dir.clone())
                .join(APP_NAME);

            Self {
                snapshot: app_data.join(SNAPSHOT_FILE),
                state_dir: app_data.join("state"),
                is_portable: false,
            }
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        if !self.state_dir.exists() {
            debug!("Creating state directory: {}", self.state_dir.display());
            std::fs::create_dir_all(&self.state_dir)?;
        }

        if let Some(snapshot_parent) = self.snapshot.parent() {
            if !snapshot_parent.exists() {
                debug!(
                    "Creating snapshot directory: {}",
                    snapshot_parent.display()
                );
                std::fs::create_dir_all(snapshot_parent)?;
            }
        }

        Ok(())
    }

    /// Materialize the bundled maintenance curtain into the state
    /// directory and return its `file://` URL.
    ///
    /// The render surface can only be handed a real URL, so the embedded
    /// image is written out once per launch.
    pub fn maintenance_asset_url(&self) -> Result<Url> {
        let asset = Assets::get("img/curtain.png")
            .context("maintenance asset missing from bundle")?;

        let target = self.state_dir.join("curtain.png");
        std::fs::write(&target, asset.data.as_ref())
            .with_context(|| format!("Failed to write maintenance asset: {}", target.display()))?;

        Url::from_file_path(&target)
            .map_err(|_| anyhow::anyhow!("maintenance asset path is not absolute: {}", target.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_app_paths_structure() {
        let paths = AppPaths {
            snapshot: PathBuf::from("test/managed-config.yaml"),
            state_dir: PathBuf::from("test/.state"),
            is_portable: true,
        };

        assert!(paths.is_portable);
        assert_eq!(paths.snapshot, PathBuf::from("test/managed-config.yaml"));
    }

    #[test]
    fn test_maintenance_asset_materialization() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths {
            snapshot: temp_dir.path().join("managed-config.yaml"),
            state_dir: temp_dir.path().to_path_buf(),
            is_portable: true,
        };

        let url = paths.maintenance_asset_url().unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("curtain.png"));
        assert!(temp_dir.path().join("curtain.png").exists());
    }
}
