//! The OS window capability consumed by capture and restore.
//!
//! Everything platform-specific sits behind [`WindowCapability`]; the
//! orchestrator only sees live windows, opaque window references and typed
//! errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Bounds, DisplayInfo};

#[cfg(test)]
pub(crate) mod fake;

/// Where a window sat in one listing.
///
/// On macOS this is the owning process id plus the 1-based window index
/// inside that process. System Events orders windows front to back, so the
/// index is only meaningful for the listing it came from; backends act on a
/// [`LiveWindow`] and find it again by title and bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct WindowRef {
    pub pid: i32,
    pub index: u32,
}

/// A window as currently reported by the OS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveWindow {
    pub window_ref: WindowRef,
    pub app_name: String,
    pub title: String,
    pub pid: i32,
    pub bounds: Bounds,
    pub minimized: bool,
    pub hidden: bool,
}

impl LiveWindow {
    pub fn is_visible(&self) -> bool {
        !self.minimized && !self.hidden
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("accessibility permission not granted")]
    PermissionDenied,
    #[error("failed to move window: {0}")]
    Move(String),
    #[error("failed to resize window: {0}")]
    Resize(String),
    #[error("failed to change window visibility: {0}")]
    Visibility(String),
    #[error("failed to launch application: {0}")]
    Launch(String),
    #[error("failed to query windows: {0}")]
    Query(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

#[async_trait]
pub trait WindowCapability: Send + Sync {
    /// Whether the Accessibility permission needed to move windows is granted.
    async fn accessibility_available(&self) -> bool;

    /// All regular on-screen application windows, in enumeration order.
    async fn list_windows(&self) -> CapabilityResult<Vec<LiveWindow>>;

    /// Windows owned by the application with this human-readable name.
    async fn list_windows_for_app(&self, app_name: &str) -> CapabilityResult<Vec<LiveWindow>> {
        let windows = self.list_windows().await?;
        Ok(windows
            .into_iter()
            .filter(|window| window.app_name == app_name)
            .collect())
    }

    async fn list_displays(&self) -> CapabilityResult<Vec<DisplayInfo>>;

    /// Move and resize the window listed as `window`. A failure while
    /// setting the position is [`CapabilityError::Move`], while setting the
    /// size [`CapabilityError::Resize`].
    async fn move_resize(&self, window: &LiveWindow, bounds: Bounds) -> CapabilityResult<()>;

    async fn set_visible(&self, window: &LiveWindow, visible: bool) -> CapabilityResult<()>;

    /// Ask the OS to start (or activate) an application by its display name.
    async fn launch_by_name(&self, app_name: &str) -> CapabilityResult<()>;
}
