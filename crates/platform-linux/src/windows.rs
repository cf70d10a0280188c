//! Top-level window discovery through `wmctrl`.

use std::process::Command;

use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::{Rect, WindowInfo};

/// List managed top-level windows.
///
/// Windows on a virtual desktop other than the current one are reported
/// with `on_screen = false`.
pub fn list_windows() -> PidrecResult<Vec<WindowInfo>> {
    let output = Command::new("wmctrl")
        .arg("-lpG")
        .output()
        .map_err(|e| {
            PidrecError::platform(format!(
                "Failed to execute wmctrl. Install with: sudo apt install wmctrl ({e})"
            ))
        })?;

    if !output.status.success() {
        return Err(PidrecError::platform(format!(
            "wmctrl -lpG exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let current_desktop = current_desktop();
    Ok(parse_wmctrl(
        &String::from_utf8_lossy(&output.stdout),
        current_desktop,
    ))
}

/// Parse `wmctrl -lpG` output.
///
/// Each line is `id desktop pid x y w h host title...`; the title may be
/// absent or contain spaces.
pub fn parse_wmctrl(text: &str, current_desktop: Option<i64>) -> Vec<WindowInfo> {
    text.lines()
        .filter_map(|line| parse_wmctrl_line(line, current_desktop))
        .collect()
}

fn parse_wmctrl_line(line: &str, current_desktop: Option<i64>) -> Option<WindowInfo> {
    let mut rest = line;
    let mut fields = [""; 8];
    for field in fields.iter_mut() {
        let trimmed = rest.trim_start();
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        *field = &trimmed[..end];
        rest = &trimmed[end..];
    }
    if fields.iter().any(|f| f.is_empty()) {
        return None;
    }

    let id = u64::from_str_radix(fields[0].trim_start_matches("0x"), 16).ok()?;
    let desktop: i64 = fields[1].parse().ok()?;
    let pid: u32 = fields[2].parse().ok()?;
    let x: i32 = fields[3].parse().ok()?;
    let y: i32 = fields[4].parse().ok()?;
    let width: u32 = fields[5].parse().ok()?;
    let height: u32 = fields[6].parse().ok()?;

    // -1 marks a sticky window, visible on every desktop.
    let on_screen = desktop == -1 || current_desktop.map_or(true, |d| d == desktop);

    Some(WindowInfo {
        id,
        pid,
        title: rest.trim().to_string(),
        frame: Rect::new(x, y, width, height),
        on_screen,
    })
}

/// Index of the active virtual desktop from `wmctrl -d`, if it can be read.
fn current_desktop() -> Option<i64> {
    let output = Command::new("wmctrl").arg("-d").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_current_desktop(&String::from_utf8_lossy(&output.stdout))
}

fn parse_current_desktop(text: &str) -> Option<i64> {
    text.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        let index = tokens.next()?.parse().ok()?;
        (tokens.next()? == "*").then_some(index)
    })
}

/// First window owned by `pid` that is on screen and has a title.
pub fn select_primary_window(windows: &[WindowInfo], pid: u32) -> PidrecResult<WindowInfo> {
    if !windows.iter().any(|w| w.pid == pid) {
        let mut pids: Vec<u32> = windows.iter().map(|w| w.pid).collect();
        pids.sort_unstable();
        pids.dedup();
        return Err(PidrecError::discovery(format!(
            "Can't find a process with PID={pid} owning any window (found PIDs: {pids:?})"
        )));
    }

    windows
        .iter()
        .find(|w| w.pid == pid && w.on_screen && !w.title.trim().is_empty())
        .cloned()
        .ok_or_else(|| {
            PidrecError::discovery(format!(
                "Can't find any windows for PID={pid} that are on screen and have a title"
            ))
        })
}
