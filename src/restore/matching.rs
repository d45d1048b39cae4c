//! Matching snapshot windows to live windows.
//!
//! Candidates are filtered by `app_name`; among those an exact title match
//! wins, otherwise the app's first window in enumeration order is taken.
//! Windows sharing a title resolve to whichever the OS listed first.
//!
//! A live window is handed out at most once per restore run. When an app's
//! live windows are exhausted, further snapshot entries for it find nothing
//! and take the launch path.
//!
//! Listing positions shift whenever a window is raised or a new one opens, so
//! claims are keyed by owner, title and current bounds rather than by
//! [`WindowRef`](crate::capability::WindowRef). Windows that agree on all three
//! are interchangeable; claiming one of them hides one occurrence per claim.

use std::collections::HashMap;

use crate::capability::LiveWindow;
use crate::db::{Bounds, WindowInfo};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    pid: i32,
    title: String,
    bounds: Bounds,
}

impl WindowKey {
    fn of(window: &LiveWindow) -> Self {
        Self {
            pid: window.pid,
            title: window.title.clone(),
            bounds: window.bounds,
        }
    }
}

/// The live windows seen at the start of a restore plus the set already
/// matched to earlier snapshot entries.
#[derive(Debug, Default)]
pub struct WindowPool {
    live: Vec<LiveWindow>,
    claimed: HashMap<WindowKey, usize>,
}

impl WindowPool {
    pub fn new(live: Vec<LiveWindow>) -> Self {
        Self {
            live,
            claimed: HashMap::new(),
        }
    }

    /// Match against the initial live set and claim the result.
    pub fn claim_match(&mut self, target: &WindowInfo) -> Option<LiveWindow> {
        let found = self.select(&self.live, target)?;
        self.claim(&found);
        Some(found)
    }

    /// Match against a fresh window listing (e.g. while polling after a
    /// launch) and claim the result.
    pub fn claim_from(
        &mut self,
        candidates: &[LiveWindow],
        target: &WindowInfo,
    ) -> Option<LiveWindow> {
        let found = self.select(candidates, target)?;
        self.claim(&found);
        Some(found)
    }

    /// Record that a claimed window now sits at `bounds`.
    pub fn moved(&mut self, window: &LiveWindow, bounds: Bounds) {
        self.release(&WindowKey::of(window));
        *self
            .claimed
            .entry(WindowKey {
                bounds,
                ..WindowKey::of(window)
            })
            .or_insert(0) += 1;
    }

    fn claim(&mut self, window: &LiveWindow) {
        *self.claimed.entry(WindowKey::of(window)).or_insert(0) += 1;
    }

    fn release(&mut self, key: &WindowKey) {
        if let Some(count) = self.claimed.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.claimed.remove(key);
            }
        }
    }

    fn select(&self, candidates: &[LiveWindow], target: &WindowInfo) -> Option<LiveWindow> {
        let available = self.unclaimed(candidates, &target.app_name);
        let exact = target
            .window_title
            .as_deref()
            .and_then(|title| available.iter().find(|window| window.title == title));
        exact.or_else(|| available.first()).map(|window| (*window).clone())
    }

    /// `app`'s candidates minus one occurrence per claim on the same key.
    fn unclaimed<'a>(&self, candidates: &'a [LiveWindow], app: &str) -> Vec<&'a LiveWindow> {
        let mut seen: HashMap<WindowKey, usize> = HashMap::new();
        candidates
            .iter()
            .filter(|window| window.app_name == app)
            .filter(|window| {
                let key = WindowKey::of(window);
                let taken = self.claimed.get(&key).copied().unwrap_or(0);
                let ordinal = seen.entry(key).or_insert(0);
                *ordinal += 1;
                *ordinal > taken
            })
            .collect()
    }
}
