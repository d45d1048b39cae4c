//! Reading the current screen layout into a snapshot.

use chrono::NaiveDateTime;

use crate::capability::{CapabilityResult, LiveWindow, WindowCapability};
use crate::db::{DisplayInfo, Snapshot, WindowInfo};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Windows and displays as seen at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLayout {
    pub windows: Vec<WindowInfo>,
    pub displays: Vec<DisplayInfo>,
}

impl CapturedLayout {
    pub fn into_snapshot(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Snapshot {
        Snapshot::new(name, description, self.windows, self.displays)
    }

    /// Snapshot with a timestamped `Auto_` name and a generated description.
    pub fn into_auto_snapshot(self, now: NaiveDateTime) -> Snapshot {
        let description = auto_description(self.windows.len());
        self.into_snapshot(auto_snapshot_name(now), description)
    }
}

pub async fn capture_layout(capability: &dyn WindowCapability) -> CapabilityResult<CapturedLayout> {
    let displays = capability.list_displays().await?;
    let live = capability.list_windows().await?;

    let windows: Vec<WindowInfo> = live
        .into_iter()
        .map(|window| window_info(window, &displays))
        .collect();

    log_info!(
        "[Capture] {} windows across {} displays",
        windows.len(),
        displays.len()
    );
    Ok(CapturedLayout { windows, displays })
}

pub fn auto_snapshot_name(now: NaiveDateTime) -> String {
    format!("Auto_{}", now.format("%Y%m%d_%H%M%S"))
}

pub fn auto_description(window_count: usize) -> String {
    format!("Auto-captured layout with {window_count} windows")
}

fn window_info(window: LiveWindow, displays: &[DisplayInfo]) -> WindowInfo {
    let display_id = display_for(&window, displays);
    WindowInfo {
        app_name: window.app_name,
        window_title: Some(window.title).filter(|title| !title.is_empty()),
        pid: window.pid,
        x: window.bounds.x,
        y: window.bounds.y,
        width: window.bounds.width,
        height: window.bounds.height,
        display_id,
        is_minimized: window.minimized,
        is_hidden: window.hidden,
    }
}

/// Display containing the window's origin, else the main display, else 0.
fn display_for(window: &LiveWindow, displays: &[DisplayInfo]) -> u32 {
    displays
        .iter()
        .find(|display| display.bounds().contains_point(window.bounds.x, window.bounds.y))
        .or_else(|| displays.iter().find(|display| display.is_main))
        .map(|display| display.display_id)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::capability::fake::{live, FakeCapability};
    use crate::capability::CapabilityError;
    use crate::db::Bounds;

    fn display(id: u32, is_main: bool, x: i32, width: i32) -> DisplayInfo {
        DisplayInfo {
            display_id: id,
            name: format!("Display {id}"),
            is_main,
            x,
            y: 0,
            width,
            height: 1080,
        }
    }

    #[test]
    fn auto_names_use_compact_timestamp() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 42)
            .unwrap();
        assert_eq!(auto_snapshot_name(now), "Auto_20240309_070542");
        assert_eq!(auto_description(3), "Auto-captured layout with 3 windows");
    }

    #[tokio::test]
    async fn assigns_windows_to_the_display_holding_their_origin() {
        let fake = FakeCapability::new()
            .with_display(display(1, true, 0, 1920))
            .with_display(display(2, false, 1920, 2560))
            .with_window(live("Safari", "Docs", 10, 1, Bounds::new(100, 100, 800, 600)))
            .with_window(live("Slack", "", 11, 1, Bounds::new(2000, 50, 800, 600)))
            .with_window(live("Zoom", "Call", 12, 1, Bounds::new(-5000, 0, 400, 300)));

        let layout = capture_layout(&fake).await.unwrap();

        let ids: Vec<u32> = layout.windows.iter().map(|w| w.display_id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
        assert_eq!(layout.windows[1].window_title, None);
        assert_eq!(layout.displays.len(), 2);
    }

    #[tokio::test]
    async fn no_displays_means_display_zero() {
        let fake = FakeCapability::new()
            .with_window(live("Safari", "Docs", 10, 1, Bounds::new(0, 0, 10, 10)));
        let layout = capture_layout(&fake).await.unwrap();
        assert_eq!(layout.windows[0].display_id, 0);
    }

    #[tokio::test]
    async fn query_errors_propagate() {
        let fake = FakeCapability::new().failing_queries(CapabilityError::PermissionDenied);
        assert_eq!(
            capture_layout(&fake).await.unwrap_err(),
            CapabilityError::PermissionDenied
        );
    }

    #[tokio::test]
    async fn auto_snapshot_counts_windows() {
        let fake = FakeCapability::new()
            .with_window(live("Safari", "Docs", 10, 1, Bounds::new(0, 0, 10, 10)))
            .with_window(live("Mail", "Inbox", 11, 1, Bounds::new(0, 0, 10, 10)));
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let snapshot = capture_layout(&fake).await.unwrap().into_auto_snapshot(now);

        assert_eq!(snapshot.name, "Auto_20240101_000000");
        assert_eq!(snapshot.description, "Auto-captured layout with 2 windows");
        assert_eq!(snapshot.windows.len(), 2);
    }
}
