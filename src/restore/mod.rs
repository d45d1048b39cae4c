pub mod controller;
pub mod events;
pub mod launch;
pub mod matching;
pub mod options;

pub use controller::RestoreOrchestrator;
pub use events::{
    ChannelProgress, LogProgress, NoopProgress, ProgressSink, RestoreEvent, RestoreProgress,
};
pub use options::RestoreOptions;
