//! Managed View - Rust implementation
//!
//! Kiosk-mode controller for a single embedded web view driven by
//! externally-pushed configuration snapshots.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use managed_view::config::{self, watcher::SnapshotWatcher, CanonicalConfig};
use managed_view::controller::{Controller, ReconcileCause};
use managed_view::paths::AppPaths;
use managed_view::platform::ConsolePlatform;

/// Managed View - kiosk-mode controller for a managed embedded web view
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the managed configuration snapshot file
    /// (default: auto-detected per platform)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print the reconciled canonical configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Report the single-app-lock capability as absent (console platform)
    #[arg(long)]
    lock_unsupported: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting Managed View...");

    // Resolve snapshot and state paths
    let paths = match &args.config {
        Some(path) => {
            let snapshot = PathBuf::from(path);
            let state_dir = snapshot
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(".state");
            AppPaths {
                snapshot,
                state_dir,
                is_portable: true,
            }
        }
        None => AppPaths::detect(),
    };
    paths.ensure_directories()?;
    info!("Snapshot file: {}", paths.snapshot.display());

    // Handle print-config diagnostic
    if args.print_config {
        print_reconciled(&paths).await?;
        return Ok(());
    }

    let maintenance_url = paths.maintenance_asset_url()?;

    // Load the initial snapshot with change notifications enabled
    let snapshot_path = paths.snapshot.to_string_lossy().to_string();
    let (mut watcher, initial_snapshot) = SnapshotWatcher::new(snapshot_path).await?;
    info!("Snapshot loaded successfully with change notifications enabled");

    // Wire the platform collaborators and spawn the controller
    let platform = ConsolePlatform::bundle(!args.lock_unsupported);
    let controller = Controller::spawn(platform, maintenance_url);

    controller.apply_snapshot(initial_snapshot, ReconcileCause::Boot);

    // Set up shutdown signal
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            // Handle snapshot deliveries
            Some(snapshot) = watcher.next_snapshot() => {
                info!("📝 Configuration snapshot changed, reconciling...");
                controller.apply_snapshot(snapshot, ReconcileCause::ConfigChanged);
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    controller.shutdown();
    info!("Managed View shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

/// Dump the canonical record the current snapshot reconciles to.
async fn print_reconciled(paths: &AppPaths) -> Result<()> {
    use colored::*;

    let snapshot =
        config::watcher::load_snapshot(&paths.snapshot.to_string_lossy()).await?;
    let config = config::reconcile(&CanonicalConfig::default(), &snapshot);

    let toggle = |on: bool| if on { "ON".green() } else { "OFF".yellow() };
    let url = |u: &Option<url::Url>| {
        u.as_ref()
            .map(|u| u.as_str().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };

    println!("\n{}", "=== Reconciled Configuration ===".bold().cyan());
    println!("  Snapshot keys present: {}", snapshot.len().to_string().green());

    println!("\n{}", "Display:".bold());
    println!("  Home URL:         {}", url(&config.home_url).green());
    println!("  Target URL:       {}", url(&config.target_url).green());
    println!("  Maintenance mode: {}", toggle(config.maintenance_mode));
    println!("  Entity decoding:  {}", toggle(config.entity_decode_enabled));

    println!("\n{}", "Chrome:".bold());
    println!("  Browser mode:     {}", toggle(config.browser_mode));
    println!("  Address bar lock: {}", toggle(config.browser_mode_locked));
    println!("  QR scanning:      {}", toggle(config.qr_enabled));
    println!("  Redirect policy:  {:?}", config.redirect_policy);
    println!("  Pop-up auto-open: {}", toggle(config.popup_auto_open));

    println!("\n{}", "Session:".bold());
    println!("  Privacy mode:     {}", toggle(config.privacy_mode));
    println!(
        "  Idle reset:       {}",
        if config.idle_reset_seconds == 0 {
            "disabled".yellow().to_string()
        } else {
            format!("{}s", config.idle_reset_seconds).green().to_string()
        }
    );
    println!("  Reset on scroll:  {}", toggle(config.reset_on_scroll));
    println!("  Launch delay:     {}s", config.launch_delay_seconds);

    println!("\n{}", "Lock:".bold());
    println!("  Lock target:      {}", toggle(config.lock_target));
    println!(
        "  Unlock substring: {}",
        if config.lock_suppress_substring.is_empty() {
            "(none)".to_string()
        } else {
            config.lock_suppress_substring.clone()
        }
    );
    println!("  SSL override:     {}", toggle(config.trust_override));
    println!("  Config listener:  {}", toggle(config.config_listener_enabled));

    println!("\n{}", "✅ Snapshot reconciles cleanly".green().bold());

    Ok(())
}
