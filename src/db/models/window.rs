//! Window and display geometry as captured into a snapshot.

use serde::{Deserialize, Serialize};

/// Absolute screen rectangle in global display coordinates (points).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when every edge delta is within `tolerance` pixels.
    pub fn within_tolerance(&self, other: &Bounds, tolerance: u32) -> bool {
        let tolerance = i64::from(tolerance);
        let close = |a: i32, b: i32| (i64::from(a) - i64::from(b)).abs() <= tolerance;

        close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.width, other.width)
            && close(self.height, other.height)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One window's identity and geometry inside a snapshot.
///
/// `app_name` is the match key during restore; `pid` is recorded for
/// reference only and is never used to find a window again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub app_name: String,
    #[serde(default)]
    pub window_title: Option<String>,
    #[serde(default)]
    pub pid: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub display_id: u32,
    #[serde(default)]
    pub is_minimized: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

impl WindowInfo {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    pub fn title_or_empty(&self) -> &str {
        self.window_title.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub display_id: u32,
    pub name: String,
    pub is_main: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DisplayInfo {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}
