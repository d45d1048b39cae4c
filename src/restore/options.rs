use std::time::Duration;

/// Tunables for one restore run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreOptions {
    /// Delay between window queries while waiting for a launched app.
    pub poll_interval: Duration,

    /// How long to wait for a launched app's window before giving up.
    pub launch_timeout: Duration,

    /// Position and size deltas up to this many pixels count as "in place".
    pub tolerance_px: u32,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            launch_timeout: Duration::from_secs(10),
            tolerance_px: 2,
        }
    }
}
