mod restore_reports;
mod snapshots;
