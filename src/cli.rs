//! Command-line front end. Every command prints JSON on stdout.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use crate::app::SpaceWarp;
use crate::autosave::AutoSaveController;
use crate::macos_bridge;
use crate::restore::{LogProgress, NoopProgress, ProgressSink};
use crate::settings::SettingsStore;

#[derive(Parser)]
#[command(name = "spacewarp", version, about = "Save and restore macOS window layouts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Capture the current window layout into a snapshot
    Capture {
        /// Snapshot name (defaults to Auto_<timestamp>)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List saved snapshots, newest first
    List,
    /// Show one snapshot in full
    Show { name: String },
    /// Put every window of a snapshot back where it was
    Restore {
        name: String,
        /// Do not log per-window progress
        #[arg(long)]
        quiet: bool,
    },
    /// Drop every window of an application from a snapshot
    RemoveApp { name: String, app: String },
    /// Delete a snapshot
    Delete { name: String },
    /// Show the last restore report for a snapshot
    Report { name: String },
    /// Show earlier window lists of a snapshot
    History { name: String },
    /// Periodically capture the layout until interrupted
    Autosave {
        /// Seconds between captures (overrides settings)
        #[arg(long)]
        interval: Option<u64>,
        /// Snapshot name to save into (overrides settings)
        #[arg(long)]
        name: Option<String>,
    },
    /// Show settings, updating any values given as flags
    Settings(SettingsArgs),
    /// Check the Accessibility permission
    Permissions {
        /// Open the Accessibility pane in System Settings
        #[arg(long)]
        open: bool,
    },
}

#[derive(Args, Default)]
pub struct SettingsArgs {
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[arg(long)]
    launch_timeout_secs: Option<u64>,
    #[arg(long)]
    tolerance_px: Option<u32>,
    #[arg(long)]
    auto_save_interval_secs: Option<u64>,
    #[arg(long)]
    auto_save_name: Option<String>,
    #[arg(long)]
    max_history: Option<usize>,
}

impl Command {
    pub async fn run(self, app: &SpaceWarp) -> Result<()> {
        match self {
            Command::Capture { name, description } => {
                let snapshot = app
                    .capture_snapshot(name.as_deref(), description.as_deref())
                    .await?;
                print_json(&snapshot)
            }
            Command::List => print_json(&app.list_snapshots().await?),
            Command::Show { name } => match app.get_snapshot(&name).await? {
                Some(snapshot) => print_json(&snapshot),
                None => bail!("snapshot '{name}' not found"),
            },
            Command::Restore { name, quiet } => {
                let progress: Arc<dyn ProgressSink> = if quiet {
                    Arc::new(NoopProgress)
                } else {
                    Arc::new(LogProgress)
                };
                let report = app.restore(&name, progress).await?;
                print_json(&report)
            }
            Command::RemoveApp { name, app: app_name } => {
                let removed = app.remove_app(&name, &app_name).await?;
                print_json(&json!({ "snapshot": name, "app": app_name, "updated": removed }))
            }
            Command::Delete { name } => {
                let deleted = app.delete_snapshot(&name).await?;
                print_json(&json!({ "snapshot": name, "deleted": deleted }))
            }
            Command::Report { name } => match app.last_report(&name).await? {
                Some(report) => print_json(&report),
                None => bail!("no restore report for '{name}'"),
            },
            Command::History { name } => print_json(&app.snapshot_history(&name).await?),
            Command::Autosave { interval, name } => run_autosave(app, interval, name).await,
            Command::Settings(args) => {
                apply_settings(app.settings(), args)?;
                print_json(&json!({
                    "restore": app.settings().restore(),
                    "snapshots": app.settings().snapshots(),
                }))
            }
            Command::Permissions { open } => {
                let granted = app.permissions_granted().await;
                if open && !granted {
                    macos_bridge::open_accessibility_settings()?;
                }
                print_json(&json!({ "granted": granted }))
            }
        }
    }
}

async fn run_autosave(
    app: &SpaceWarp,
    interval: Option<u64>,
    name: Option<String>,
) -> Result<()> {
    let mut settings = app.settings().snapshots();
    if let Some(secs) = interval {
        if secs == 0 {
            bail!("interval must be positive");
        }
        settings.auto_save_interval_secs = secs;
    }
    if let Some(name) = name {
        settings.auto_save_name = name;
    }

    let mut controller = AutoSaveController::new();
    controller
        .start(app.capability(), app.database().clone(), settings)
        .await?;

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted, stopping auto-save");
    controller.stop().await
}

fn apply_settings(store: &SettingsStore, args: SettingsArgs) -> Result<()> {
    let mut restore = store.restore();
    let restore_changed = args.poll_interval_ms.is_some()
        || args.launch_timeout_secs.is_some()
        || args.tolerance_px.is_some();
    if let Some(value) = args.poll_interval_ms {
        restore.poll_interval_ms = value;
    }
    if let Some(value) = args.launch_timeout_secs {
        restore.launch_timeout_secs = value;
    }
    if let Some(value) = args.tolerance_px {
        restore.tolerance_px = value;
    }
    if restore_changed {
        store.update_restore(restore)?;
    }

    let mut snapshots = store.snapshots();
    let snapshots_changed = args.auto_save_interval_secs.is_some()
        || args.auto_save_name.is_some()
        || args.max_history.is_some();
    if let Some(value) = args.auto_save_interval_secs {
        snapshots.auto_save_interval_secs = value;
    }
    if let Some(value) = args.auto_save_name {
        snapshots.auto_save_name = value;
    }
    if let Some(value) = args.max_history {
        snapshots.max_history = value;
    }
    if snapshots_changed {
        store.update_snapshots(snapshots)?;
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
