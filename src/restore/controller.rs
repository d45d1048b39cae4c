use std::sync::Arc;

use chrono::Utc;

use crate::capability::{CapabilityError, LiveWindow, WindowCapability};
use crate::db::{RestoreFailure, RestoreItemResult, RestoreReport, Snapshot, WindowInfo};

use super::events::{NoopProgress, ProgressSink, RestoreProgress};
use super::launch::{wait_for_window, WaitOutcome};
use super::matching::WindowPool;
use super::options::RestoreOptions;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Drives one snapshot back onto the screen.
///
/// Windows are handled one at a time in snapshot order. Each one ends in
/// exactly one [`RestoreItemResult`]; nothing short of a lost Accessibility
/// permission stops the run early.
pub struct RestoreOrchestrator {
    capability: Arc<dyn WindowCapability>,
    options: RestoreOptions,
    progress: Arc<dyn ProgressSink>,
}

impl RestoreOrchestrator {
    pub fn new(capability: Arc<dyn WindowCapability>, options: RestoreOptions) -> Self {
        Self {
            capability,
            options,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn restore_layout(&self, snapshot: Snapshot) -> RestoreReport {
        let started_at = Utc::now();
        let total = snapshot.windows.len();
        log_info!(
            "[Restore] restoring '{}' ({} windows)",
            snapshot.name,
            total
        );

        let mut denied = !self.capability.accessibility_available().await;
        let mut pool = if denied {
            log_warn!("[Restore] accessibility permission missing; nothing will be moved");
            WindowPool::default()
        } else {
            match self.capability.list_windows().await {
                Ok(live) => WindowPool::new(live),
                Err(CapabilityError::PermissionDenied) => {
                    denied = true;
                    WindowPool::default()
                }
                Err(err) => {
                    log_warn!(
                        "[Restore] initial window query failed, launching everything: {}",
                        err
                    );
                    WindowPool::default()
                }
            }
        };

        let mut items = Vec::with_capacity(total);
        for (index, target) in snapshot.windows.iter().enumerate() {
            self.progress.on_progress(&RestoreProgress::Started {
                index,
                total,
                app_name: target.app_name.clone(),
                window_title: target.window_title.clone(),
            });

            let item = if denied {
                RestoreItemResult::failure(
                    &target.app_name,
                    target.window_title.as_deref(),
                    false,
                    RestoreFailure::PermissionsMissing,
                )
            } else {
                self.restore_window(target, &mut pool).await
            };

            if item.reason.map_or(false, |reason| reason.is_fatal()) {
                denied = true;
            }

            self.progress
                .on_progress(&RestoreProgress::finished(index, total, &item));
            items.push(item);
        }

        let report = RestoreReport::from_items(&snapshot.name, started_at, Utc::now(), items);
        log_info!("[Restore] {}", report.summary());
        self.progress.on_complete(&report);
        report
    }

    async fn restore_window(
        &self,
        target: &WindowInfo,
        pool: &mut WindowPool,
    ) -> RestoreItemResult {
        let title = target.window_title.as_deref();

        if let Some(live) = pool.claim_match(target) {
            log_debug!(
                "[Restore] {} '{}' matched live window {:?}",
                target.app_name,
                target.title_or_empty(),
                live.window_ref
            );
            return self.place(&live, target, pool, false).await;
        }

        if let Err(err) = self.capability.launch_by_name(&target.app_name).await {
            log_warn!("[Restore] launching {} failed: {}", target.app_name, err);
            let reason = match err {
                CapabilityError::PermissionDenied => RestoreFailure::PermissionsMissing,
                _ => RestoreFailure::LaunchFailed,
            };
            return RestoreItemResult::failure(&target.app_name, title, false, reason);
        }

        match wait_for_window(self.capability.as_ref(), target, pool, &self.options).await {
            WaitOutcome::Found(live) => self.place(&live, target, pool, true).await,
            WaitOutcome::TimedOut => RestoreItemResult::failure(
                &target.app_name,
                title,
                true,
                RestoreFailure::WindowTimeout,
            ),
            WaitOutcome::PermissionDenied => RestoreItemResult::failure(
                &target.app_name,
                title,
                true,
                RestoreFailure::PermissionsMissing,
            ),
        }
    }

    /// Un-minimize `live` if needed, then move it unless it already sits
    /// within tolerance of the saved bounds.
    async fn place(
        &self,
        live: &LiveWindow,
        target: &WindowInfo,
        pool: &mut WindowPool,
        launched: bool,
    ) -> RestoreItemResult {
        let title = target.window_title.as_deref();

        if !live.is_visible() {
            if let Err(err) = self.capability.set_visible(live, true).await {
                log_warn!("[Restore] showing {} failed: {}", target.app_name, err);
                let reason = match err {
                    CapabilityError::PermissionDenied => RestoreFailure::PermissionsMissing,
                    _ => RestoreFailure::MinimizeFailed,
                };
                return RestoreItemResult::failure(&target.app_name, title, launched, reason);
            }
        }

        let wanted = target.bounds();
        if live.bounds.within_tolerance(&wanted, self.options.tolerance_px) {
            return RestoreItemResult::success(&target.app_name, title, launched);
        }

        match self.capability.move_resize(live, wanted).await {
            Ok(()) => {
                pool.moved(live, wanted);
                RestoreItemResult::success(&target.app_name, title, launched)
            }
            Err(err) => {
                log_warn!("[Restore] placing {} failed: {}", target.app_name, err);
                let reason = match err {
                    CapabilityError::PermissionDenied => RestoreFailure::PermissionsMissing,
                    CapabilityError::Resize(_) => RestoreFailure::ResizeFailed,
                    _ => RestoreFailure::MoveFailed,
                };
                RestoreItemResult::failure(&target.app_name, title, launched, reason)
            }
        }
    }
}
