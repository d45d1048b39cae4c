//! Scriptable in-memory capability for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CapabilityError, CapabilityResult, LiveWindow, WindowCapability, WindowRef};
use crate::db::{Bounds, DisplayInfo};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListWindows,
    ListDisplays,
    MoveResize(WindowRef, Bounds),
    SetVisible(WindowRef, bool),
    Launch(String),
}

struct PendingWindow {
    window: LiveWindow,
    delay: Duration,
    armed_at: Option<Instant>,
}

#[derive(Default)]
struct FakeState {
    windows: Vec<LiveWindow>,
    pending: Vec<PendingWindow>,
    displays: Vec<DisplayInfo>,
    calls: Vec<Call>,
    failing_launches: HashSet<String>,
    move_errors: HashMap<String, CapabilityError>,
    visibility_errors: HashMap<String, CapabilityError>,
    query_error: Option<CapabilityError>,
    /// Listings that succeed before `query_error` kicks in.
    queries_before_error: usize,
}

pub(crate) struct FakeCapability {
    accessibility: bool,
    state: Mutex<FakeState>,
}

pub(crate) fn live(app: &str, title: &str, pid: i32, index: u32, bounds: Bounds) -> LiveWindow {
    LiveWindow {
        window_ref: WindowRef { pid, index },
        app_name: app.to_string(),
        title: title.to_string(),
        pid,
        bounds,
        minimized: false,
        hidden: false,
    }
}

impl FakeCapability {
    pub(crate) fn new() -> Self {
        Self {
            accessibility: true,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn without_accessibility() -> Self {
        Self {
            accessibility: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn with_window(self, window: LiveWindow) -> Self {
        self.state().windows.push(window);
        self
    }

    pub(crate) fn with_display(self, display: DisplayInfo) -> Self {
        self.state().displays.push(display);
        self
    }

    /// A window that shows up `delay` after its app is launched.
    pub(crate) fn with_launchable(self, window: LiveWindow, delay: Duration) -> Self {
        self.state().pending.push(PendingWindow {
            window,
            delay,
            armed_at: None,
        });
        self
    }

    pub(crate) fn failing_launch(self, app: &str) -> Self {
        self.state().failing_launches.insert(app.to_string());
        self
    }

    pub(crate) fn failing_move(self, app: &str, error: CapabilityError) -> Self {
        self.state().move_errors.insert(app.to_string(), error);
        self
    }

    pub(crate) fn failing_visibility(self, app: &str, error: CapabilityError) -> Self {
        self.state().visibility_errors.insert(app.to_string(), error);
        self
    }

    pub(crate) fn failing_queries(self, error: CapabilityError) -> Self {
        self.failing_queries_after(0, error)
    }

    pub(crate) fn failing_queries_after(self, successes: usize, error: CapabilityError) -> Self {
        {
            let mut state = self.state();
            state.query_error = Some(error);
            state.queries_before_error = successes;
        }
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn move_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::MoveResize(..)))
            .count()
    }

    pub(crate) fn launch_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Launch(_)))
            .count()
    }

    pub(crate) fn visibility_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::SetVisible(..)))
            .count()
    }

    pub(crate) fn window(&self, window_ref: WindowRef) -> Option<LiveWindow> {
        let state = self.state();
        state
            .windows
            .iter()
            .chain(state.pending.iter().map(|pending| &pending.window))
            .find(|window| window.window_ref == window_ref)
            .cloned()
    }

    pub(crate) fn window_titled(&self, app: &str, title: &str) -> Option<LiveWindow> {
        let state = self.state();
        state
            .windows
            .iter()
            .chain(state.pending.iter().map(|pending| &pending.window))
            .find(|window| window.app_name == app && window.title == title)
            .cloned()
    }

    fn visible_windows(state: &FakeState) -> Vec<LiveWindow> {
        let now = Instant::now();
        let mut windows = state.windows.clone();
        windows.extend(
            state
                .pending
                .iter()
                .filter(|pending| {
                    pending
                        .armed_at
                        .map(|armed| armed + pending.delay <= now)
                        .unwrap_or(false)
                })
                .map(|pending| pending.window.clone()),
        );
        windows
    }

    fn all_mut(state: &mut FakeState) -> impl Iterator<Item = &mut LiveWindow> {
        let FakeState {
            windows, pending, ..
        } = state;
        windows
            .iter_mut()
            .chain(pending.iter_mut().map(|pending| &mut pending.window))
    }

    /// Find `listed` again the way the macOS bridge does: by owner, title and
    /// bounds, preferring the window still at the listed position.
    fn resolve<'a>(state: &'a mut FakeState, listed: &LiveWindow) -> Option<&'a mut LiveWindow> {
        let same = |window: &LiveWindow| {
            window.pid == listed.pid
                && window.title == listed.title
                && window.bounds == listed.bounds
        };
        let at_listed_index = Self::all_mut(state)
            .any(|window| same(&*window) && window.window_ref == listed.window_ref);
        Self::all_mut(state).find(|window| {
            same(&**window) && (!at_listed_index || window.window_ref == listed.window_ref)
        })
    }

    /// Bring `window` to the front of its process, shifting the windows that
    /// were ahead of it back by one.
    fn raise(state: &mut FakeState, window: WindowRef) {
        for other in Self::all_mut(state) {
            if other.pid != window.pid {
                continue;
            }
            if other.window_ref.index == window.index {
                other.window_ref.index = 1;
            } else if other.window_ref.index < window.index {
                other.window_ref.index += 1;
            }
        }
    }
}

#[async_trait]
impl WindowCapability for FakeCapability {
    async fn accessibility_available(&self) -> bool {
        self.accessibility
    }

    async fn list_windows(&self) -> CapabilityResult<Vec<LiveWindow>> {
        let mut state = self.state();
        state.calls.push(Call::ListWindows);
        if let Some(err) = state.query_error.clone() {
            if state.queries_before_error == 0 {
                return Err(err);
            }
            state.queries_before_error -= 1;
        }
        let mut windows = Self::visible_windows(&state);
        windows.sort_by_key(|window| (window.pid, window.window_ref.index));
        Ok(windows)
    }

    async fn list_displays(&self) -> CapabilityResult<Vec<DisplayInfo>> {
        let mut state = self.state();
        state.calls.push(Call::ListDisplays);
        Ok(state.displays.clone())
    }

    async fn move_resize(&self, window: &LiveWindow, bounds: Bounds) -> CapabilityResult<()> {
        let mut state = self.state();
        state.calls.push(Call::MoveResize(window.window_ref, bounds));

        if let Some(err) = state.move_errors.get(&window.app_name).cloned() {
            return Err(err);
        }
        let target = Self::resolve(&mut state, window)
            .ok_or_else(|| CapabilityError::Move("no such window".into()))?;
        target.bounds = bounds;
        Ok(())
    }

    async fn set_visible(&self, window: &LiveWindow, visible: bool) -> CapabilityResult<()> {
        let mut state = self.state();
        state.calls.push(Call::SetVisible(window.window_ref, visible));

        if let Some(err) = state.visibility_errors.get(&window.app_name).cloned() {
            return Err(err);
        }
        let target = Self::resolve(&mut state, window)
            .ok_or_else(|| CapabilityError::Visibility("no such window".into()))?;
        target.minimized = !visible;
        target.hidden = !visible;
        let current = target.window_ref;
        if visible {
            Self::raise(&mut state, current);
        }
        Ok(())
    }

    async fn launch_by_name(&self, app_name: &str) -> CapabilityResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Launch(app_name.to_string()));

        if state.failing_launches.contains(app_name) {
            return Err(CapabilityError::Launch(format!("{app_name} not installed")));
        }

        let now = Instant::now();
        for pending in state
            .pending
            .iter_mut()
            .filter(|pending| pending.window.app_name == app_name && pending.armed_at.is_none())
        {
            pending.armed_at = Some(now);
        }
        Ok(())
    }
}
