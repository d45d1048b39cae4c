pub mod app;
pub mod autosave;
pub mod capability;
pub mod capture;
pub mod cli;
pub mod db;
pub mod macos_bridge;
pub mod restore;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

pub use app::SpaceWarp;
pub use db::{RestoreFailure, RestoreItemResult, RestoreReport, Snapshot, WindowInfo};
pub use restore::{RestoreOptions, RestoreOrchestrator};

use cli::Cli;
use macos_bridge::MacOsWindowCapability;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let data_dir = app::default_data_dir()?;
        let app = SpaceWarp::open(data_dir, Arc::new(MacOsWindowCapability::new()))?;
        cli.command.run(&app).await
    })
}
