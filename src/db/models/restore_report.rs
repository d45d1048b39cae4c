//! Restore outcome models.
//!
//! One `RestoreItemResult` per snapshot window, aggregated into a
//! `RestoreReport` that is persisted per snapshot name (latest wins).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RestoreFailure {
    PermissionsMissing,
    LaunchFailed,
    WindowTimeout,
    MoveFailed,
    ResizeFailed,
    MinimizeFailed,
}

impl RestoreFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreFailure::PermissionsMissing => "permissions_missing",
            RestoreFailure::LaunchFailed => "launch_failed",
            RestoreFailure::WindowTimeout => "window_timeout",
            RestoreFailure::MoveFailed => "move_failed",
            RestoreFailure::ResizeFailed => "resize_failed",
            RestoreFailure::MinimizeFailed => "minimize_failed",
        }
    }

    /// Whether this failure aborts every item that follows it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RestoreFailure::PermissionsMissing)
    }
}

impl std::fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreItemResult {
    pub app_name: String,
    pub window_title: Option<String>,
    pub restored: bool,
    pub launched: bool,
    pub reason: Option<RestoreFailure>,
}

impl RestoreItemResult {
    pub fn success(app_name: &str, window_title: Option<&str>, launched: bool) -> Self {
        Self {
            app_name: app_name.to_string(),
            window_title: window_title.map(str::to_string),
            restored: true,
            launched,
            reason: None,
        }
    }

    pub fn failure(
        app_name: &str,
        window_title: Option<&str>,
        launched: bool,
        reason: RestoreFailure,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            window_title: window_title.map(str::to_string),
            restored: false,
            launched,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub id: String,
    pub snapshot_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub restored_count: usize,
    pub failed_count: usize,
    pub items: Vec<RestoreItemResult>,
}

impl RestoreReport {
    /// Build the final report; counts are always derived from `items`.
    pub fn from_items(
        snapshot_name: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        items: Vec<RestoreItemResult>,
    ) -> Self {
        let total = items.len();
        let restored_count = items.iter().filter(|item| item.restored).count();

        Self {
            id: format!("rr_{}", uuid::Uuid::new_v4()),
            snapshot_name: snapshot_name.to_string(),
            started_at,
            finished_at,
            total,
            restored_count,
            failed_count: total - restored_count,
            items,
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_count == 0
    }

    /// Sorted, de-duplicated names of apps with at least one failed window.
    pub fn failed_apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = self
            .items
            .iter()
            .filter(|item| !item.restored)
            .map(|item| item.app_name.clone())
            .collect();
        apps.sort();
        apps.dedup();
        apps
    }

    /// One-line status text, e.g. `Restored 2/3. Failed: Mail`.
    pub fn summary(&self) -> String {
        if self.is_complete_success() {
            format!(
                "Restored {}/{} for '{}'",
                self.restored_count, self.total, self.snapshot_name
            )
        } else {
            format!(
                "Restored {}/{}. Failed: {}",
                self.restored_count,
                self.total,
                self.failed_apps().join(", ")
            )
        }
    }
}
