//! Snapshot data models.
//!
//! A snapshot is stored as one row per name; windows, displays and metadata
//! are JSON blobs on that row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::window::{DisplayInfo, WindowInfo};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub windows: Vec<WindowInfo>,
    pub displays: Vec<DisplayInfo>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        windows: Vec<WindowInfo>,
        displays: Vec<DisplayInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            windows,
            displays,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Distinct app names in window order.
    pub fn app_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for window in &self.windows {
            if !names.contains(&window.app_name.as_str()) {
                names.push(&window.app_name);
            }
        }
        names
    }
}

/// Lightweight listing row for snapshot pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub name: String,
    pub description: String,
    pub window_count: usize,
    pub display_count: usize,
    pub apps: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            description: snapshot.description.clone(),
            window_count: snapshot.windows.len(),
            display_count: snapshot.displays.len(),
            apps: snapshot
                .app_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            updated_at: snapshot.updated_at,
        }
    }
}

/// A previous window list kept when a snapshot name is overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHistoryEntry {
    pub id: i64,
    pub snapshot_name: String,
    pub created_at: DateTime<Utc>,
    pub windows: Vec<WindowInfo>,
}
