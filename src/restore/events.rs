//! Progress notifications emitted while a restore runs.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::db::{RestoreFailure, RestoreItemResult, RestoreReport};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RestoreProgress {
    #[serde(rename_all = "camelCase")]
    Started {
        index: usize,
        total: usize,
        app_name: String,
        window_title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Succeeded {
        index: usize,
        total: usize,
        item: RestoreItemResult,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        index: usize,
        total: usize,
        item: RestoreItemResult,
        reason: RestoreFailure,
    },
}

impl RestoreProgress {
    pub(crate) fn finished(index: usize, total: usize, item: &RestoreItemResult) -> Self {
        match item.reason {
            Some(reason) if !item.restored => RestoreProgress::Failed {
                index,
                total,
                item: item.clone(),
                reason,
            },
            _ => RestoreProgress::Succeeded {
                index,
                total,
                item: item.clone(),
            },
        }
    }
}

/// Observer of a running restore. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &RestoreProgress);

    fn on_complete(&self, report: &RestoreReport);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &RestoreProgress) {}

    fn on_complete(&self, _report: &RestoreReport) {}
}

/// Writes every event to the `log` facade.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, event: &RestoreProgress) {
        match event {
            RestoreProgress::Started {
                index,
                total,
                app_name,
                window_title,
            } => log::info!(
                "[{}/{}] restoring {} {}",
                index + 1,
                total,
                app_name,
                window_title.as_deref().unwrap_or("")
            ),
            RestoreProgress::Succeeded { index, total, item } => log::info!(
                "[{}/{}] {} restored{}",
                index + 1,
                total,
                item.app_name,
                if item.launched { " (launched)" } else { "" }
            ),
            RestoreProgress::Failed {
                index,
                total,
                item,
                reason,
            } => log::warn!("[{}/{}] {} failed: {}", index + 1, total, item.app_name, reason),
        }
    }

    fn on_complete(&self, report: &RestoreReport) {
        log::info!("{}", report.summary());
    }
}

#[derive(Debug, Clone)]
pub enum RestoreEvent {
    Progress(RestoreProgress),
    Complete(RestoreReport),
}

/// Forwards events over an unbounded channel so a presentation layer can
/// render them on its own task.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<RestoreEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RestoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, event: &RestoreProgress) {
        // A closed receiver just means nobody is watching anymore.
        let _ = self.tx.send(RestoreEvent::Progress(event.clone()));
    }

    fn on_complete(&self, report: &RestoreReport) {
        let _ = self.tx.send(RestoreEvent::Complete(report.clone()));
    }
}
