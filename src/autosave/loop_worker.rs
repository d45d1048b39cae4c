use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capability::WindowCapability;
use crate::capture::{auto_description, capture_layout};
use crate::db::Database;
use crate::settings::SnapshotSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const CAPTURE_TIMEOUT_SECS: u64 = 30;

pub async fn auto_save_loop(
    capability: Arc<dyn WindowCapability>,
    db: Database,
    settings: SnapshotSettings,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.auto_save_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "auto-save every {:?} into '{}'",
        settings.auto_save_interval(),
        settings.auto_save_name
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fut = perform_auto_save(capability.as_ref(), &db, &settings);
                match tokio::time::timeout(Duration::from_secs(CAPTURE_TIMEOUT_SECS), fut).await {
                    Ok(Ok(count)) => log_info!(
                        "auto-saved {} windows into '{}'",
                        count,
                        settings.auto_save_name
                    ),
                    Ok(Err(err)) => log_error!("auto-save failed: {err:?}"),
                    Err(_) => log_warn!("auto-save timed out (> {}s)", CAPTURE_TIMEOUT_SECS),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("auto-save loop shutting down");
                break;
            }
        }
    }
}

async fn perform_auto_save(
    capability: &dyn WindowCapability,
    db: &Database,
    settings: &SnapshotSettings,
) -> Result<usize> {
    let layout = capture_layout(capability)
        .await
        .context("failed to capture layout")?;
    let count = layout.windows.len();

    let snapshot = layout.into_snapshot(settings.auto_save_name.clone(), auto_description(count));
    db.save_snapshot(&snapshot, settings.max_history)
        .await
        .context("failed to persist auto-save snapshot")?;
    Ok(count)
}
