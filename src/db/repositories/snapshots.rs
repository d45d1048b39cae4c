use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{from_json, from_optional_json, parse_datetime, to_json},
    models::{Snapshot, SnapshotHistoryEntry, WindowInfo},
    Database,
};

const SNAPSHOT_COLUMNS: &str =
    "id, name, description, created_at, updated_at, windows_json, displays_json, metadata_json";

fn row_to_snapshot(row: &Row) -> Result<Snapshot> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let windows_json: String = row.get("windows_json")?;
    let displays_json: String = row.get("displays_json")?;
    let metadata_json: Option<String> = row.get("metadata_json")?;

    Ok(Snapshot {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        description: row.get::<_, Option<String>>("description")?.unwrap_or_default(),
        windows: from_json(&windows_json, "windows_json")?,
        displays: from_json(&displays_json, "displays_json")?,
        metadata: from_optional_json(metadata_json, "metadata_json")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn query_active_snapshot(conn: &Connection, name: &str) -> Result<Option<Snapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE name = ?1 AND is_active = 1"
    ))?;
    let mut rows = stmt.query(params![name])?;
    match rows.next()? {
        Some(row) => row_to_snapshot(row).map(Some),
        None => Ok(None),
    }
}

impl Database {
    pub async fn get_snapshot(&self, name: &str) -> Result<Option<Snapshot>> {
        let name = name.to_string();
        self.execute(move |conn| query_active_snapshot(conn, &name))
            .await
    }

    /// Active snapshots, most recently updated first.
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
                 WHERE is_active = 1
                 ORDER BY updated_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(row_to_snapshot(row)?);
            }

            Ok(snapshots)
        })
        .await
    }

    pub async fn snapshot_names(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM snapshots WHERE is_active = 1 ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    /// Insert or overwrite a snapshot by name.
    ///
    /// When a row with this name already exists its previous window list is
    /// appended to `snapshot_history`, which is then trimmed to the newest
    /// `max_history` entries. Saving over a deleted name reactivates it.
    pub async fn save_snapshot(&self, snapshot: &Snapshot, max_history: usize) -> Result<Snapshot> {
        if snapshot.name.trim().is_empty() {
            bail!("snapshot name is required");
        }

        let record = snapshot.clone();
        self.execute(move |conn| {
            let windows_json = to_json(&record.windows, "windows")?;
            let displays_json = to_json(&record.displays, "displays")?;
            let metadata_json = to_json(&record.metadata, "metadata")?;
            let now = Utc::now().to_rfc3339();

            let tx = conn
                .transaction()
                .context("failed to open snapshot save transaction")?;

            let existing: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, windows_json FROM snapshots WHERE name = ?1",
                    params![record.name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match existing {
                Some((id, previous_windows)) => {
                    tx.execute(
                        "INSERT INTO snapshot_history (snapshot_id, created_at, windows_json)
                         VALUES (?1, ?2, ?3)",
                        params![id, now, previous_windows],
                    )?;
                    tx.execute(
                        "DELETE FROM snapshot_history
                         WHERE snapshot_id = ?1
                           AND id NOT IN (
                               SELECT id FROM snapshot_history
                               WHERE snapshot_id = ?1
                               ORDER BY id DESC
                               LIMIT ?2
                           )",
                        params![id, max_history as i64],
                    )?;
                    tx.execute(
                        "UPDATE snapshots
                         SET description = ?1,
                             windows_json = ?2,
                             displays_json = ?3,
                             metadata_json = ?4,
                             updated_at = ?5,
                             is_active = 1
                         WHERE id = ?6",
                        params![
                            record.description,
                            windows_json,
                            displays_json,
                            metadata_json,
                            now,
                            id,
                        ],
                    )
                    .with_context(|| format!("failed to overwrite snapshot '{}'", record.name))?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO snapshots
                             (name, description, created_at, updated_at, windows_json, displays_json, metadata_json)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            record.name,
                            record.description,
                            record.created_at.to_rfc3339(),
                            now,
                            windows_json,
                            displays_json,
                            metadata_json,
                        ],
                    )
                    .with_context(|| format!("failed to insert snapshot '{}'", record.name))?;
                }
            }

            let saved = query_active_snapshot(&tx, &record.name)?
                .with_context(|| format!("snapshot '{}' missing after save", record.name))?;
            tx.commit().context("failed to commit snapshot save")?;

            Ok(saved)
        })
        .await
    }

    /// Replace the window list of an existing snapshot, leaving everything
    /// else untouched. Returns whether a row was updated.
    pub async fn update_windows(&self, name: &str, windows: Vec<WindowInfo>) -> Result<bool> {
        let name = name.to_string();
        self.execute(move |conn| {
            let windows_json = to_json(&windows, "windows")?;
            let changed = conn.execute(
                "UPDATE snapshots
                 SET windows_json = ?1,
                     updated_at = ?2
                 WHERE name = ?3 AND is_active = 1",
                params![windows_json, Utc::now().to_rfc3339(), name],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    /// Drop every window belonging to `app_name` from the named snapshot.
    ///
    /// The read and the write share one transaction on the DB thread, so the
    /// filter always applies to the latest stored window list. Returns
    /// `false` when no active snapshot has this name.
    pub async fn remove_app_from_snapshot(&self, name: &str, app_name: &str) -> Result<bool> {
        let name = name.to_string();
        let app_name = app_name.to_string();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open remove-app transaction")?;

            let windows_json: Option<String> = tx
                .query_row(
                    "SELECT windows_json FROM snapshots WHERE name = ?1 AND is_active = 1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(windows_json) = windows_json else {
                return Ok(false);
            };

            let mut windows: Vec<WindowInfo> = from_json(&windows_json, "windows_json")?;
            windows.retain(|window| window.app_name != app_name);

            let changed = tx.execute(
                "UPDATE snapshots
                 SET windows_json = ?1,
                     updated_at = ?2
                 WHERE name = ?3 AND is_active = 1",
                params![to_json(&windows, "windows")?, Utc::now().to_rfc3339(), name],
            )?;
            tx.commit().context("failed to commit remove-app")?;

            Ok(changed == 1)
        })
        .await
    }

    /// Soft delete; the row stays on disk with `is_active = 0`.
    pub async fn delete_snapshot(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE snapshots SET is_active = 0 WHERE name = ?1 AND is_active = 1",
                params![name],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    /// Previous window lists for a snapshot, newest first.
    pub async fn snapshot_history(&self, name: &str) -> Result<Vec<SnapshotHistoryEntry>> {
        let name = name.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.created_at, h.windows_json
                 FROM snapshot_history h
                 JOIN snapshots s ON s.id = h.snapshot_id
                 WHERE s.name = ?1
                 ORDER BY h.id DESC",
            )?;

            let mut rows = stmt.query(params![name])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let created_at: String = row.get(1)?;
                let windows_json: String = row.get(2)?;
                entries.push(SnapshotHistoryEntry {
                    id: row.get(0)?,
                    snapshot_name: name.clone(),
                    created_at: parse_datetime(&created_at, "created_at")?,
                    windows: from_json(&windows_json, "windows_json")?,
                });
            }

            Ok(entries)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{DisplayInfo, Snapshot, WindowInfo};
    use crate::db::test_support::temp_database;

    fn window(app: &str, title: &str) -> WindowInfo {
        WindowInfo {
            app_name: app.into(),
            window_title: Some(title.into()),
            pid: 100,
            x: 0,
            y: 0,
            width: 800,
            height: 600,
            display_id: 1,
            is_minimized: false,
            is_hidden: false,
        }
    }

    fn main_display() -> DisplayInfo {
        DisplayInfo {
            display_id: 1,
            name: "Built-in Retina Display".into(),
            is_main: true,
            x: 0,
            y: 0,
            width: 1512,
            height: 982,
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trip_preserves_window_order() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new(
            "work",
            "desk setup",
            vec![window("Safari", "Docs"), window("Mail", "Inbox")],
            vec![main_display()],
        );

        db.save_snapshot(&snapshot, 10).await.unwrap();
        let loaded = db.get_snapshot("work").await.unwrap().unwrap();

        assert_eq!(loaded.description, "desk setup");
        assert_eq!(loaded.windows, snapshot.windows);
        assert_eq!(loaded.displays, snapshot.displays);
        assert!(loaded.id.is_some());
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let (_dir, db) = temp_database();
        assert!(db.get_snapshot("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_same_name_overwrites_and_records_history() {
        let (_dir, db) = temp_database();
        let first = Snapshot::new("work", "", vec![window("Safari", "A")], vec![]);
        let second = Snapshot::new("work", "", vec![window("Mail", "B")], vec![]);

        db.save_snapshot(&first, 10).await.unwrap();
        db.save_snapshot(&second, 10).await.unwrap();

        let loaded = db.get_snapshot("work").await.unwrap().unwrap();
        assert_eq!(loaded.windows[0].app_name, "Mail");
        assert_eq!(db.snapshot_names().await.unwrap(), vec!["work".to_string()]);

        let history = db.snapshot_history("work").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].windows[0].app_name, "Safari");
    }

    #[tokio::test]
    async fn history_is_trimmed_to_limit() {
        let (_dir, db) = temp_database();
        for i in 0..5 {
            let snapshot =
                Snapshot::new("auto", "", vec![window("Safari", &format!("tab {i}"))], vec![]);
            db.save_snapshot(&snapshot, 2).await.unwrap();
        }

        let history = db.snapshot_history("auto").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].windows[0].title_or_empty(), "tab 3");
        assert_eq!(history[1].windows[0].title_or_empty(), "tab 2");
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new("  ", "", vec![], vec![]);
        assert!(db.save_snapshot(&snapshot, 10).await.is_err());
    }

    #[tokio::test]
    async fn remove_app_drops_every_matching_window() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new(
            "chat",
            "",
            vec![
                window("Slack", "one"),
                window("Safari", "docs"),
                window("Slack", "two"),
                window("Terminal", "zsh"),
                window("Slack", "three"),
            ],
            vec![main_display()],
        );
        let saved = db.save_snapshot(&snapshot, 10).await.unwrap();

        assert!(db.remove_app_from_snapshot("chat", "Slack").await.unwrap());

        let loaded = db.get_snapshot("chat").await.unwrap().unwrap();
        assert_eq!(loaded.windows.len(), 2);
        assert!(loaded.windows.iter().all(|w| w.app_name != "Slack"));
        assert_eq!(loaded.displays, saved.displays);
        assert_eq!(loaded.description, saved.description);
        assert!(loaded.updated_at >= saved.updated_at);
    }

    #[tokio::test]
    async fn remove_app_is_idempotent() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new(
            "chat",
            "",
            vec![window("Slack", "one"), window("Safari", "docs")],
            vec![],
        );
        db.save_snapshot(&snapshot, 10).await.unwrap();

        db.remove_app_from_snapshot("chat", "Slack").await.unwrap();
        let once = db.get_snapshot("chat").await.unwrap().unwrap().windows;
        db.remove_app_from_snapshot("chat", "Slack").await.unwrap();
        let twice = db.get_snapshot("chat").await.unwrap().unwrap().windows;

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn removing_last_app_leaves_a_loadable_empty_snapshot() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new("solo", "", vec![window("Slack", "one")], vec![]);
        db.save_snapshot(&snapshot, 10).await.unwrap();

        assert!(db.remove_app_from_snapshot("solo", "Slack").await.unwrap());
        let loaded = db.get_snapshot("solo").await.unwrap().unwrap();
        assert!(loaded.windows.is_empty());
    }

    #[tokio::test]
    async fn remove_app_from_missing_snapshot_returns_false() {
        let (_dir, db) = temp_database();
        assert!(!db.remove_app_from_snapshot("ghost", "Slack").await.unwrap());
    }

    #[tokio::test]
    async fn update_windows_replaces_list() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new("work", "", vec![window("Safari", "A")], vec![]);
        db.save_snapshot(&snapshot, 10).await.unwrap();

        assert!(db
            .update_windows("work", vec![window("Notes", "B")])
            .await
            .unwrap());
        assert!(!db.update_windows("missing", vec![]).await.unwrap());

        let loaded = db.get_snapshot("work").await.unwrap().unwrap();
        assert_eq!(loaded.windows[0].app_name, "Notes");
    }

    #[tokio::test]
    async fn delete_hides_snapshot_until_saved_again() {
        let (_dir, db) = temp_database();
        let snapshot = Snapshot::new("work", "", vec![window("Safari", "A")], vec![]);
        db.save_snapshot(&snapshot, 10).await.unwrap();

        assert!(db.delete_snapshot("work").await.unwrap());
        assert!(!db.delete_snapshot("work").await.unwrap());
        assert!(db.get_snapshot("work").await.unwrap().is_none());
        assert!(db.list_snapshots().await.unwrap().is_empty());

        db.save_snapshot(&snapshot, 10).await.unwrap();
        assert!(db.get_snapshot("work").await.unwrap().is_some());
    }
}
