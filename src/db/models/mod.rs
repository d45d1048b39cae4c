pub mod restore_report;
pub mod snapshot;
pub mod window;

pub use restore_report::{RestoreFailure, RestoreItemResult, RestoreReport};
pub use snapshot::{Snapshot, SnapshotHistoryEntry, SnapshotSummary};
pub use window::{Bounds, DisplayInfo, WindowInfo};
