//! Process → window → display binding for X11 sessions.

use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::{
    CaptureSource, ContentFilter, DisplayServer, MonitorInfo, ResolveOptions, SourceResolver,
    WindowInfo,
};

use crate::display::{detect_display_server, detect_monitors};
use crate::windows::{list_windows, select_primary_window};

/// First display whose bounds contain the window's origin.
pub fn select_display(monitors: &[MonitorInfo], window: &WindowInfo) -> PidrecResult<MonitorInfo> {
    let (x, y) = window.frame.origin();
    monitors
        .iter()
        .find(|m| m.frame().contains_point(x, y))
        .cloned()
        .ok_or_else(|| {
            PidrecError::discovery(format!(
                "No display contains window {:#x} at ({x},{y})",
                window.id
            ))
        })
}

/// Build the capture source for an already-selected window and display.
pub fn build_capture_source(
    display: MonitorInfo,
    window: WindowInfo,
    all_windows: Vec<WindowInfo>,
    options: &ResolveOptions,
) -> PidrecResult<CaptureSource> {
    let (filter, width, height) = if options.window_only {
        let width = window.frame.width;
        let height = window.frame.height;
        (ContentFilter::SingleWindow { window }, width, height)
    } else {
        let width = display.capture_width();
        let height = display.capture_height();
        let windows = all_windows.into_iter().filter(|w| w.on_screen).collect();
        (
            ContentFilter::DisplayIncludingWindows {
                display: display.clone(),
                windows,
            },
            width,
            height,
        )
    };

    CaptureSource::new(
        display,
        filter,
        // x264 needs even dimensions for 4:2:0 chroma.
        width & !1,
        height & !1,
        CaptureSource::interval_for_fps(options.fps),
        options.queue_depth,
    )
}

/// Resolves a process ID using `wmctrl` and `xrandr`.
#[derive(Debug, Default)]
pub struct X11SourceResolver;

impl X11SourceResolver {
    pub fn new() -> Self {
        Self
    }
}

impl SourceResolver for X11SourceResolver {
    fn resolve(&self, pid: u32, options: &ResolveOptions) -> PidrecResult<CaptureSource> {
        match detect_display_server() {
            DisplayServer::X11 => {}
            DisplayServer::Wayland => {
                return Err(PidrecError::unsupported(
                    "Window capture by PID needs an X11 session (or XWayland with DISPLAY set and WAYLAND_DISPLAY unset)",
                ));
            }
            other => {
                return Err(PidrecError::platform(format!(
                    "Unsupported display server: {other:?}"
                )));
            }
        }

        let windows = list_windows()?;
        let window = select_primary_window(&windows, pid)?;
        let monitors = detect_monitors()?;
        let monitor = select_display(&monitors, &window)?;

        tracing::info!(
            pid,
            window_id = window.id,
            title = %window.title,
            display = %monitor.name,
            "Resolved capture target"
        );

        build_capture_source(monitor, window, windows, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidrec_platform_core::Rect;

    fn monitors() -> Vec<MonitorInfo> {
        vec![
            MonitorInfo {
                name: "left".to_string(),
                width: 1920,
                height: 1080,
                x: -1920,
                y: 0,
                scale_factor: 1.0,
                refresh_rate_hz: 60,
                primary: false,
            },
            MonitorInfo {
                name: "main".to_string(),
                width: 2560,
                height: 1440,
                x: 0,
                y: 0,
                scale_factor: 1.0,
                refresh_rate_hz: 60,
                primary: true,
            },
        ]
    }

    fn window(x: i32, y: i32) -> WindowInfo {
        WindowInfo {
            id: 0x3a00010,
            pid: 4242,
            title: "Login Page".to_string(),
            frame: Rect::new(x, y, 1281, 721),
            on_screen: true,
        }
    }

    #[test]
    fn display_is_chosen_by_window_origin() {
        let display = select_display(&monitors(), &window(-500, 200)).unwrap();
        assert_eq!(display.name, "left");
        let display = select_display(&monitors(), &window(100, 100)).unwrap();
        assert_eq!(display.name, "main");
        assert!(select_display(&monitors(), &window(5000, 0)).is_err());
    }

    #[test]
    fn whole_display_source_uses_display_geometry() {
        let display = monitors().remove(1);
        let target = window(100, 100);
        let source =
            build_capture_source(display, target.clone(), vec![target], &ResolveOptions::default())
                .unwrap();
        assert_eq!((source.width, source.height), (2560, 1440));
        assert_eq!(source.queue_depth, 6);
        assert_eq!(source.fps(), 60);
        assert!(matches!(
            source.filter,
            ContentFilter::DisplayIncludingWindows { ref windows, .. } if windows.len() == 1
        ));
    }

    #[test]
    fn window_only_source_rounds_to_even_geometry() {
        let display = monitors().remove(1);
        let options = ResolveOptions {
            window_only: true,
            ..ResolveOptions::default()
        };
        let source =
            build_capture_source(display, window(100, 100), Vec::new(), &options).unwrap();
        assert_eq!((source.width, source.height), (1280, 720));
        assert_eq!(source.filter.window().map(|w| w.id), Some(0x3a00010));
    }
}
