use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use crate::db::{
    helpers::{from_json, to_json},
    models::RestoreReport,
    Database,
};

impl Database {
    /// Store the report as the latest one for its snapshot, replacing any
    /// previous report.
    pub async fn save_restore_report(&self, report: &RestoreReport) -> Result<()> {
        let record = report.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO restore_reports (snapshot_name, report_id, finished_at, report_json)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(snapshot_name) DO UPDATE SET
                     report_id = excluded.report_id,
                     finished_at = excluded.finished_at,
                     report_json = excluded.report_json",
                params![
                    record.snapshot_name,
                    record.id,
                    record.finished_at.to_rfc3339(),
                    to_json(&record, "restore report")?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn last_restore_report(&self, snapshot_name: &str) -> Result<Option<RestoreReport>> {
        let snapshot_name = snapshot_name.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT report_json FROM restore_reports WHERE snapshot_name = ?1",
                    params![snapshot_name],
                    |row| row.get(0),
                )
                .optional()?;

            raw.map(|json| from_json(&json, "report_json")).transpose()
        })
        .await
    }
}
