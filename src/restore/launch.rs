//! Waiting for a freshly launched app to show a window.

use tokio::time::{sleep, Instant};

use super::matching::WindowPool;
use super::options::RestoreOptions;
use crate::capability::{CapabilityError, LiveWindow, WindowCapability};
use crate::db::WindowInfo;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Found(LiveWindow),
    TimedOut,
    PermissionDenied,
}

/// Poll `app`'s windows until an unclaimed one matches `target` or the
/// launch deadline passes. The first query happens right away; a matched
/// window is claimed in `pool` before it is returned.
pub async fn wait_for_window(
    capability: &dyn WindowCapability,
    target: &WindowInfo,
    pool: &mut WindowPool,
    options: &RestoreOptions,
) -> WaitOutcome {
    let deadline = Instant::now() + options.launch_timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match capability.list_windows_for_app(&target.app_name).await {
            Ok(candidates) => {
                if let Some(found) = pool.claim_from(&candidates, target) {
                    log_debug!(
                        "[Restore] {} window appeared after {} poll(s)",
                        target.app_name,
                        attempts
                    );
                    return WaitOutcome::Found(found);
                }
            }
            Err(CapabilityError::PermissionDenied) => return WaitOutcome::PermissionDenied,
            Err(err) => {
                log_warn!("[Restore] polling {} failed: {}", target.app_name, err);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            log_warn!(
                "[Restore] gave up waiting for {} after {:?}",
                target.app_name,
                options.launch_timeout
            );
            return WaitOutcome::TimedOut;
        }
        sleep(options.poll_interval.min(deadline - now)).await;
    }
}
