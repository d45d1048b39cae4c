//! The `SpaceWarp` facade: one handle over the store, the settings and the
//! window capability, exposing the operations a front end needs.

use std::{
    collections::HashSet,
    env,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;

use crate::capability::WindowCapability;
use crate::capture::{auto_description, capture_layout};
use crate::db::{Database, RestoreReport, Snapshot, SnapshotHistoryEntry, SnapshotSummary};
use crate::restore::{ProgressSink, RestoreOrchestrator};
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::log_info;

const DATA_DIR_ENV: &str = "SPACEWARP_HOME";
const DATABASE_FILE: &str = "snapshots.db";
const SETTINGS_FILE: &str = "settings.json";

/// `$SPACEWARP_HOME` when set, otherwise `~/.spacewarp`.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".spacewarp"))
        .ok_or_else(|| anyhow!("could not determine home directory"))
}

pub struct SpaceWarp {
    db: Database,
    settings: Arc<SettingsStore>,
    capability: Arc<dyn WindowCapability>,
    restoring: Mutex<HashSet<String>>,
}

impl SpaceWarp {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        capability: Arc<dyn WindowCapability>,
    ) -> Self {
        Self {
            db,
            settings,
            capability,
            restoring: Mutex::new(HashSet::new()),
        }
    }

    /// Open the store and settings that live under `data_dir`.
    pub fn open(data_dir: PathBuf, capability: Arc<dyn WindowCapability>) -> Result<Self> {
        let db = Database::new(data_dir.join(DATABASE_FILE))
            .with_context(|| format!("failed to open snapshot store in {}", data_dir.display()))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        Ok(Self::new(db, Arc::new(settings), capability))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn capability(&self) -> Arc<dyn WindowCapability> {
        Arc::clone(&self.capability)
    }

    pub async fn permissions_granted(&self) -> bool {
        self.capability.accessibility_available().await
    }

    /// Capture the live layout and save it. Without a name the snapshot gets
    /// a timestamped `Auto_` name.
    pub async fn capture_snapshot(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Snapshot> {
        let layout = capture_layout(self.capability.as_ref())
            .await
            .context("failed to capture window layout")?;

        let mut snapshot = match name {
            Some(name) => {
                let description = auto_description(layout.windows.len());
                layout.into_snapshot(name, description)
            }
            None => layout.into_auto_snapshot(Local::now().naive_local()),
        };
        if let Some(description) = description {
            snapshot.description = description.to_string();
        }
        let saved = self
            .db
            .save_snapshot(&snapshot, self.settings.snapshots().max_history)
            .await?;
        log_info!("Saved snapshot '{}' with {} windows", saved.name, saved.windows.len());
        Ok(saved)
    }

    /// Restore the named snapshot and persist the resulting report.
    ///
    /// A second restore of the same name while one is running is rejected.
    pub async fn restore(
        &self,
        name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<RestoreReport> {
        let _guard = RestoreGuard::acquire(&self.restoring, name)?;

        let snapshot = self
            .db
            .get_snapshot(name)
            .await?
            .ok_or_else(|| anyhow!("snapshot '{name}' not found"))?;

        let orchestrator =
            RestoreOrchestrator::new(self.capability(), self.settings.restore_options())
                .with_progress(progress);
        let report = orchestrator.restore_layout(snapshot).await;

        self.db
            .save_restore_report(&report)
            .await
            .context("failed to persist restore report")?;
        Ok(report)
    }

    pub async fn remove_app(&self, name: &str, app_name: &str) -> Result<bool> {
        let removed = self.db.remove_app_from_snapshot(name, app_name).await?;
        if removed {
            log_info!("Removed {} from snapshot '{}'", app_name, name);
        }
        Ok(removed)
    }

    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        let snapshots = self.db.list_snapshots().await?;
        Ok(snapshots.iter().map(SnapshotSummary::from).collect())
    }

    pub async fn get_snapshot(&self, name: &str) -> Result<Option<Snapshot>> {
        self.db.get_snapshot(name).await
    }

    pub async fn delete_snapshot(&self, name: &str) -> Result<bool> {
        self.db.delete_snapshot(name).await
    }

    pub async fn last_report(&self, name: &str) -> Result<Option<RestoreReport>> {
        self.db.last_restore_report(name).await
    }

    pub async fn snapshot_history(&self, name: &str) -> Result<Vec<SnapshotHistoryEntry>> {
        self.db.snapshot_history(name).await
    }
}

/// Marks a snapshot name as being restored until dropped.
struct RestoreGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    name: String,
}

impl<'a> RestoreGuard<'a> {
    fn acquire(active: &'a Mutex<HashSet<String>>, name: &str) -> Result<Self> {
        let mut names = active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !names.insert(name.to_string()) {
            bail!("a restore of '{name}' is already running");
        }
        Ok(Self {
            active,
            name: name.to_string(),
        })
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        let mut names = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        names.remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::fake::{live, FakeCapability};
    use crate::db::{Bounds, DisplayInfo};
    use crate::restore::{ChannelProgress, NoopProgress, RestoreEvent};

    struct Harness {
        _dir: tempfile::TempDir,
        fake: Arc<FakeCapability>,
        app: SpaceWarp,
    }

    fn harness(fake: FakeCapability) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(fake);
        let app = SpaceWarp::open(dir.path().to_path_buf(), fake.clone()).unwrap();
        Harness {
            _dir: dir,
            fake,
            app,
        }
    }

    fn desk() -> FakeCapability {
        FakeCapability::new()
            .with_display(DisplayInfo {
                display_id: 1,
                name: "Built-in".into(),
                is_main: true,
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            })
            .with_window(live("Safari", "Docs", 10, 1, Bounds::new(0, 25, 1200, 800)))
            .with_window(live("Slack", "General", 11, 1, Bounds::new(1200, 25, 720, 800)))
    }

    #[tokio::test]
    async fn capture_then_restore_persists_report() {
        let h = harness(desk());

        let saved = h.app.capture_snapshot(Some("work"), None).await.unwrap();
        assert_eq!(saved.description, "Auto-captured layout with 2 windows");

        let report = h.app.restore("work", Arc::new(NoopProgress)).await.unwrap();
        assert!(report.is_complete_success());
        assert_eq!(h.fake.move_calls(), 0);

        let stored = h.app.last_report("work").await.unwrap().unwrap();
        assert_eq!(stored.id, report.id);
    }

    #[tokio::test]
    async fn unnamed_capture_gets_auto_name() {
        let h = harness(desk());
        let saved = h.app.capture_snapshot(None, Some("morning")).await.unwrap();
        assert!(saved.name.starts_with("Auto_"));
        assert_eq!(saved.description, "morning");
        assert_eq!(h.app.list_snapshots().await.unwrap().len(), 1);

        let generated = h.app.capture_snapshot(None, None).await.unwrap();
        assert!(generated.name.starts_with("Auto_"));
        assert_eq!(generated.description, "Auto-captured layout with 2 windows");
    }

    #[tokio::test]
    async fn restoring_unknown_snapshot_fails() {
        let h = harness(desk());
        let err = h.app.restore("nope", Arc::new(NoopProgress)).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        // the guard is released on the error path
        h.app.capture_snapshot(Some("nope"), None).await.unwrap();
        assert!(h.app.restore("nope", Arc::new(NoopProgress)).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_restore_of_same_name_is_rejected() {
        let h = harness(desk());
        h.app.capture_snapshot(Some("work"), None).await.unwrap();

        let (first, second) = tokio::join!(
            h.app.restore("work", Arc::new(NoopProgress)),
            h.app.restore("work", Arc::new(NoopProgress)),
        );

        assert!(first.is_ok());
        assert!(second.unwrap_err().to_string().contains("already running"));
        assert!(h.app.restore("work", Arc::new(NoopProgress)).await.is_ok());
    }

    #[tokio::test]
    async fn remove_app_then_restore_skips_it() {
        let h = harness(desk());
        h.app.capture_snapshot(Some("work"), None).await.unwrap();

        assert!(h.app.remove_app("work", "Slack").await.unwrap());
        assert!(h.app.remove_app("work", "Slack").await.unwrap());
        assert!(!h.app.remove_app("missing", "Slack").await.unwrap());

        let (sink, mut rx) = ChannelProgress::new();
        let report = h.app.restore("work", Arc::new(sink)).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.items[0].app_name, "Safari");

        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            if let RestoreEvent::Complete(done) = event {
                assert_eq!(done.id, report.id);
                completed = true;
            }
        }
        assert!(completed);
    }

    #[tokio::test]
    async fn recapture_keeps_history_and_delete_hides_snapshot() {
        let h = harness(desk());
        h.app.capture_snapshot(Some("work"), None).await.unwrap();
        h.app.capture_snapshot(Some("work"), None).await.unwrap();

        assert_eq!(h.app.snapshot_history("work").await.unwrap().len(), 1);
        assert!(h.app.delete_snapshot("work").await.unwrap());
        assert!(h.app.get_snapshot("work").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reports_permission_state() {
        let granted = harness(desk());
        assert!(granted.app.permissions_granted().await);

        let denied = harness(FakeCapability::without_accessibility());
        assert!(!denied.app.permissions_granted().await);
    }
}
