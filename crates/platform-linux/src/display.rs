//! Display/monitor detection.

use std::process::Command;

use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::{DisplayServer, MonitorInfo};

/// Detect connected monitors by parsing `xrandr --query`.
pub fn detect_monitors() -> PidrecResult<Vec<MonitorInfo>> {
    tracing::debug!("Detecting monitors");

    let output = Command::new("xrandr")
        .arg("--query")
        .output()
        .map_err(|e| {
            PidrecError::platform(format!(
                "Failed to execute xrandr (install x11-xserver-utils): {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(PidrecError::platform(format!(
            "xrandr exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let monitors = parse_xrandr(&String::from_utf8_lossy(&output.stdout));
    if monitors.is_empty() {
        return Err(PidrecError::platform("xrandr reported no active monitors"));
    }
    Ok(monitors)
}

/// Parse `xrandr --query` output into active monitors.
///
/// Connected outputs without a mode (`connected (normal left ...)`) are
/// skipped. The refresh rate comes from the mode line marked `*`.
pub fn parse_xrandr(text: &str) -> Vec<MonitorInfo> {
    let mut monitors: Vec<MonitorInfo> = Vec::new();
    let mut awaiting_rate = false;

    for line in text.lines() {
        if line.starts_with(char::is_whitespace) {
            if awaiting_rate {
                if let Some(rate) = current_mode_rate(line) {
                    if let Some(last) = monitors.last_mut() {
                        last.refresh_rate_hz = rate;
                    }
                    awaiting_rate = false;
                }
            }
            continue;
        }

        awaiting_rate = false;
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        if tokens.next() != Some("connected") {
            continue;
        }

        let rest: Vec<&str> = tokens.collect();
        let primary = rest.first() == Some(&"primary");
        let Some((width, height, x, y)) = rest.iter().find_map(|t| parse_geometry(t)) else {
            continue;
        };

        monitors.push(MonitorInfo {
            name: name.to_string(),
            width,
            height,
            x,
            y,
            scale_factor: 1.0,
            refresh_rate_hz: 60,
            primary,
        });
        awaiting_rate = true;
    }

    monitors
}

/// Parse `WxH+X+Y` (offsets may be negative, e.g. `1920x1080-1920+0`).
fn parse_geometry(token: &str) -> Option<(u32, u32, i32, i32)> {
    let (width, rest) = token.split_once('x')?;
    let offset_start = rest.find(['+', '-'])?;
    let (height, offsets) = rest.split_at(offset_start);

    let sign_x = &offsets[..1];
    let offsets = &offsets[1..];
    let split = offsets.find(['+', '-'])?;
    let (x, y_with_sign) = offsets.split_at(split);

    let x: i32 = x.parse().ok()?;
    let x = if sign_x == "-" { -x } else { x };
    let y: i32 = y_with_sign[1..].parse().ok()?;
    let y = if y_with_sign.starts_with('-') { -y } else { y };

    Some((width.parse().ok()?, height.parse().ok()?, x, y))
}

fn current_mode_rate(line: &str) -> Option<u32> {
    line.split_whitespace()
        .skip(1)
        .find(|t| t.contains('*'))
        .and_then(|t| t.trim_end_matches(['*', '+']).parse::<f64>().ok())
        .map(|hz| hz.round() as u32)
}

/// Detect the current display server.
pub fn detect_display_server() -> DisplayServer {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        DisplayServer::Wayland
    } else if std::env::var("DISPLAY").is_ok() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}
