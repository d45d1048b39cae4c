use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capability::WindowCapability;
use crate::db::Database;
use crate::settings::SnapshotSettings;

use super::loop_worker::auto_save_loop;

/// Owns the background auto-save task.
pub struct AutoSaveController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl AutoSaveController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn start(
        &mut self,
        capability: Arc<dyn WindowCapability>,
        db: Database,
        settings: SnapshotSettings,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("auto-save already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(auto_save_loop(capability, db, settings, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            info!("Waiting for auto-save loop to finish");
            handle
                .await
                .context("auto-save loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for AutoSaveController {
    fn default() -> Self {
        Self::new()
    }
}
