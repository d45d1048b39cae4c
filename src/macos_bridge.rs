//! macOS window capability backed by `osascript`.
//!
//! Window enumeration and manipulation go through System Events (which
//! requires the Accessibility permission); display geometry comes from a
//! small JXA script over `NSScreen`. Applications are launched with
//! `open -a`, which accepts the human-readable app name.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::capability::{
    CapabilityError, CapabilityResult, LiveWindow, WindowCapability, WindowRef,
};
use crate::db::{Bounds, DisplayInfo};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// AppleScript error numbers that mean "not allowed assistive access".
const PERMISSION_ERROR_MARKERS: [&str; 3] = ["-1719", "-25211", "assistive access"];

const FIELD_SEPARATOR: char = '\t';

const LIST_WINDOWS_SCRIPT: &str = r#"
set out to ""
tell application "System Events"
    repeat with p in (every process whose background only is false)
        set out to out & my describeProcess(p)
    end repeat
end tell
return out
"#;

const DESCRIBE_PROCESS_HANDLER: &str = r#"
on describeProcess(p)
    set out to ""
    tell application "System Events"
        set pName to name of p
        set pId to unix id of p
        set pVisible to visible of p
        set idx to 0
        repeat with w in (every window of p)
            set idx to idx + 1
            try
                set {wx, wy} to position of w
                set {ww, wh} to size of w
                set wTitle to name of w
                if wTitle is missing value then set wTitle to ""
                set wMin to false
                try
                    set wMin to value of attribute "AXMinimized" of w
                end try
                set out to out & pName & tab & pId & tab & idx & tab & wTitle & tab & wx & tab & wy & tab & ww & tab & wh & tab & wMin & tab & (not pVisible) & linefeed
            end try
        end repeat
    end tell
    return out
end describeProcess
"#;

/// Finds a listed window again. System Events numbers windows front to back,
/// so an index goes stale as soon as any window of the process is raised or
/// opened. The listed index only breaks ties between identical windows; a
/// window whose bounds changed is accepted when its title is unique.
const FIND_WINDOW_HANDLER: &str = r#"
on findWindow(pid, listedIndex, wantedTitle, wantedPosition, wantedSize)
    tell application "System Events"
        set p to first process whose unix id is pid
        set exact to {}
        set titled to {}
        repeat with i from 1 to (count of windows of p)
            set candidate to window i of p
            try
                set candidateTitle to name of candidate
                if candidateTitle is missing value then set candidateTitle to ""
                if candidateTitle is wantedTitle then
                    set end of titled to i
                    if (position of candidate as list) is wantedPosition and (size of candidate as list) is wantedSize then
                        if i is listedIndex then return candidate
                        set end of exact to i
                    end if
                end if
            end try
        end repeat
        if (count of exact) > 0 then return window (item 1 of exact) of p
        if (count of titled) is 1 then return window (item 1 of titled) of p
    end tell
    error "window is no longer listed" number -1728
end findWindow
"#;

/// Marks a failure while setting the size, as opposed to the position.
const RESIZE_ERROR_PREFIX: &str = "resize:";

const LIST_DISPLAYS_SCRIPT: &str = r#"
ObjC.import('AppKit');
var screens = $.NSScreen.screens;
var out = [];
var mainHeight = 0;
for (var i = 0; i < screens.count; i++) {
    var screen = screens.objectAtIndex(i);
    var frame = screen.frame;
    if (i === 0) { mainHeight = frame.size.height; }
    var number = screen.deviceDescription.objectForKey('NSScreenNumber');
    var name = screen.respondsToSelector('localizedName') ? ObjC.unwrap(screen.localizedName) : ('Display ' + i);
    out.push({
        displayId: number ? number.unsignedIntValue : i + 1,
        name: name,
        isMain: i === 0,
        x: Math.round(frame.origin.x),
        y: Math.round(mainHeight - frame.origin.y - frame.size.height),
        width: Math.round(frame.size.width),
        height: Math.round(frame.size.height)
    });
}
JSON.stringify(out);
"#;

/// Window capability for the current macOS user session.
pub struct MacOsWindowCapability {
    /// Owner names whose windows are never treated as application windows.
    skip_apps: Vec<String>,
}

impl MacOsWindowCapability {
    pub fn new() -> Self {
        Self {
            skip_apps: vec!["Window Server".into(), "Dock".into()],
        }
    }

    async fn run_script(&self, language: &str, script: &str) -> Result<String, String> {
        let output = Command::new("osascript")
            .arg("-l")
            .arg(language)
            .arg("-e")
            .arg(script)
            .output()
            .await
            .map_err(|err| format!("failed to run osascript: {err}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    async fn run_applescript(&self, script: &str) -> Result<String, String> {
        self.run_script("AppleScript", script).await
    }

    fn keep(&self, window: &LiveWindow) -> bool {
        !window.app_name.is_empty()
            && !self.skip_apps.iter().any(|skip| skip == &window.app_name)
            && window.bounds.width > 0
            && window.bounds.height > 0
    }

    async fn query_windows(&self, script: String) -> CapabilityResult<Vec<LiveWindow>> {
        let raw = self
            .run_applescript(&script)
            .await
            .map_err(|err| classify(err, CapabilityError::Query))?;

        let windows: Vec<LiveWindow> = parse_window_listing(&raw)
            .into_iter()
            .filter(|window| self.keep(window))
            .collect();
        log_debug!("System Events reported {} windows", windows.len());
        Ok(windows)
    }
}

impl Default for MacOsWindowCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowCapability for MacOsWindowCapability {
    async fn accessibility_available(&self) -> bool {
        check_accessibility_permission().await
    }

    async fn list_windows(&self) -> CapabilityResult<Vec<LiveWindow>> {
        self.query_windows(format!("{LIST_WINDOWS_SCRIPT}\n{DESCRIBE_PROCESS_HANDLER}"))
            .await
    }

    async fn list_windows_for_app(&self, app_name: &str) -> CapabilityResult<Vec<LiveWindow>> {
        let script = format!(
            r#"
set out to ""
tell application "System Events"
    repeat with p in (every process whose name is "{name}")
        set out to out & my describeProcess(p)
    end repeat
end tell
return out
{DESCRIBE_PROCESS_HANDLER}"#,
            name = escape_applescript(app_name),
        );
        self.query_windows(script).await
    }

    async fn list_displays(&self) -> CapabilityResult<Vec<DisplayInfo>> {
        let raw = self
            .run_script("JavaScript", LIST_DISPLAYS_SCRIPT)
            .await
            .map_err(CapabilityError::Query)?;
        parse_display_listing(&raw)
    }

    async fn move_resize(&self, window: &LiveWindow, bounds: Bounds) -> CapabilityResult<()> {
        self.run_applescript(&move_script(window, bounds))
            .await
            .map(|_| ())
            .map_err(classify_placement)
    }

    async fn set_visible(&self, window: &LiveWindow, visible: bool) -> CapabilityResult<()> {
        self.run_applescript(&visibility_script(window, visible))
            .await
            .map(|_| ())
            .map_err(|err| classify(err, CapabilityError::Visibility))
    }

    async fn launch_by_name(&self, app_name: &str) -> CapabilityResult<()> {
        let output = Command::new("open")
            .arg("-a")
            .arg(app_name)
            .output()
            .await
            .map_err(|err| CapabilityError::Launch(format!("failed to run open: {err}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_warn!("open -a {app_name} failed: {stderr}");
            Err(CapabilityError::Launch(stderr))
        }
    }
}

/// Probe whether System Events will answer UI scripting calls.
#[cfg(target_os = "macos")]
pub async fn check_accessibility_permission() -> bool {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(r#"tell application "System Events" to get UI elements enabled"#)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim() == "true"
        }
        Ok(output) => {
            log_warn!(
                "Accessibility probe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(err) => {
            log_warn!("Accessibility probe could not run osascript: {err}");
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub async fn check_accessibility_permission() -> bool {
    false
}

#[cfg(target_os = "macos")]
pub fn open_accessibility_settings() -> anyhow::Result<()> {
    use anyhow::Context;

    std::process::Command::new("open")
        .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility")
        .status()
        .context("failed to open System Settings")?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub fn open_accessibility_settings() -> anyhow::Result<()> {
    anyhow::bail!("Accessibility settings are only available on macOS")
}

/// `my findWindow(...)` for the window as it appeared in its listing.
fn find_window_call(window: &LiveWindow) -> String {
    format!(
        r#"my findWindow({pid}, {index}, "{title}", {{{x}, {y}}}, {{{width}, {height}}})"#,
        pid = window.window_ref.pid,
        index = window.window_ref.index,
        title = escape_applescript(&window.title),
        x = window.bounds.x,
        y = window.bounds.y,
        width = window.bounds.width,
        height = window.bounds.height,
    )
}

/// Position then size, on one resolved window in a single script.
fn move_script(window: &LiveWindow, bounds: Bounds) -> String {
    format!(
        r#"
set w to {find}
tell application "System Events"
    try
        set position of w to {{{x}, {y}}}
    on error errMsg number errNum
        error "move: " & errMsg number errNum
    end try
    try
        set size of w to {{{width}, {height}}}
    on error errMsg number errNum
        error "{RESIZE_ERROR_PREFIX} " & errMsg number errNum
    end try
end tell
{FIND_WINDOW_HANDLER}"#,
        find = find_window_call(window),
        x = bounds.x,
        y = bounds.y,
        width = bounds.width,
        height = bounds.height,
    )
}

fn visibility_script(window: &LiveWindow, visible: bool) -> String {
    format!(
        r#"
set w to {find}
tell application "System Events"
    if {visible} then set visible of (first process whose unix id is {pid}) to true
    set value of attribute "AXMinimized" of w to {minimized}
end tell
{FIND_WINDOW_HANDLER}"#,
        find = find_window_call(window),
        pid = window.window_ref.pid,
        minimized = !visible,
    )
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn classify(stderr: String, wrap: fn(String) -> CapabilityError) -> CapabilityError {
    if PERMISSION_ERROR_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
    {
        CapabilityError::PermissionDenied
    } else {
        wrap(stderr)
    }
}

fn classify_placement(stderr: String) -> CapabilityError {
    if stderr.contains(RESIZE_ERROR_PREFIX) {
        classify(stderr, CapabilityError::Resize)
    } else {
        classify(stderr, CapabilityError::Move)
    }
}

/// Parse the tab-separated listing produced by `describeProcess`.
///
/// Fields: app, pid, index, title, x, y, width, height, minimized, hidden.
/// The title is the only free-text field, so it is recovered as whatever
/// sits between the three leading and six trailing fields. Malformed lines
/// are skipped.
pub fn parse_window_listing(raw: &str) -> Vec<LiveWindow> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_window_line)
        .collect()
}

fn parse_window_line(line: &str) -> Option<LiveWindow> {
    let mut head = line.splitn(4, FIELD_SEPARATOR);
    let app_name = head.next()?.to_string();
    let pid: i32 = head.next()?.trim().parse().ok()?;
    let index: u32 = head.next()?.trim().parse().ok()?;
    let rest = head.next()?;

    let mut tail: Vec<&str> = rest.rsplitn(7, FIELD_SEPARATOR).collect();
    if tail.len() != 7 {
        return None;
    }
    tail.reverse();

    let title = tail[0].to_string();
    let x = parse_coordinate(tail[1])?;
    let y = parse_coordinate(tail[2])?;
    let width = parse_coordinate(tail[3])?;
    let height = parse_coordinate(tail[4])?;
    let minimized = parse_flag(tail[5])?;
    let hidden = parse_flag(tail[6])?;

    Some(LiveWindow {
        window_ref: WindowRef { pid, index },
        app_name,
        title,
        pid,
        bounds: Bounds::new(x, y, width, height),
        minimized,
        hidden,
    })
}

fn parse_coordinate(value: &str) -> Option<i32> {
    value.trim().parse::<f64>().ok().map(|v| v.round() as i32)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDisplay {
    display_id: u32,
    name: String,
    is_main: bool,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

pub fn parse_display_listing(raw: &str) -> CapabilityResult<Vec<DisplayInfo>> {
    let displays: Vec<RawDisplay> = serde_json::from_str(raw.trim())
        .map_err(|err| CapabilityError::Query(format!("invalid display listing: {err}")))?;

    Ok(displays
        .into_iter()
        .map(|raw| DisplayInfo {
            display_id: raw.display_id,
            name: raw.name,
            is_main: raw.is_main,
            x: raw.x.round() as i32,
            y: raw.y.round() as i32,
            width: raw.width.round() as i32,
            height: raw.height.round() as i32,
        })
        .collect())
}
