//! Capability detection and guidance for Linux.
//!
//! Recording a window by PID needs an X11 session, the `wmctrl` and
//! `xrandr` helpers for discovery, and GStreamer with the X11 source and
//! x264 encoder plugins.

use std::process::Command;

/// A system capability that pidrec may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Check all capabilities and report status.
pub fn check_capabilities() -> Vec<Capability> {
    vec![
        check_x11_session(),
        check_tool(
            "wmctrl",
            &["-m"],
            "Window enumeration (process to window binding)",
            "Install wmctrl: sudo apt install wmctrl",
        ),
        check_tool(
            "xrandr",
            &["--version"],
            "Monitor enumeration (window to display binding)",
            "Install xrandr: sudo apt install x11-xserver-utils",
        ),
        check_gst_element(
            "ximagesrc",
            "X11 screen capture source",
            "Install gst-plugins-good: sudo apt install gstreamer1.0-plugins-good",
        ),
        check_gst_element(
            "x264enc",
            "H.264 software encoder",
            "Install gst-plugins-ugly: sudo apt install gstreamer1.0-plugins-ugly",
        ),
        check_gst_element(
            "mp4mux",
            "MP4 container muxer",
            "Install gst-plugins-good: sudo apt install gstreamer1.0-plugins-good",
        ),
    ]
}

/// Check if an X11 display is reachable.
fn check_x11_session() -> Capability {
    let available = std::env::var("DISPLAY").is_ok();

    Capability {
        name: "X11 Session".to_string(),
        description: "X11 display connection for window capture".to_string(),
        available,
        required: true,
        fix_instructions: if !available {
            Some("Run inside a graphical X11 session (DISPLAY must be set)".to_string())
        } else {
            None
        },
    }
}

fn check_tool(name: &str, args: &[&str], description: &str, fix: &str) -> Capability {
    let available = Command::new(name)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    Capability {
        name: name.to_string(),
        description: description.to_string(),
        available,
        required: true,
        fix_instructions: (!available).then(|| fix.to_string()),
    }
}

fn check_gst_element(element: &str, description: &str, fix: &str) -> Capability {
    let available = Command::new("gst-inspect-1.0")
        .arg(element)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    Capability {
        name: format!("GStreamer {element}"),
        description: description.to_string(),
        available,
        required: true,
        fix_instructions: (!available).then(|| fix.to_string()),
    }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("pidrec System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}
