//! pidrec platform core contracts.
//!
//! This crate contains the cross-platform display/window data structures
//! and the [`CaptureSource`] descriptor that discovery produces and the
//! capture engine consumes, without coupling to a concrete OS backend.

use std::time::Duration;

use pidrec_common::error::{PidrecError, PidrecResult};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in physical pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    pub fn origin(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Whether the point lies inside the rectangle (right/bottom edges exclusive).
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        let px = px as i64;
        let py = py as i64;
        px >= self.x as i64
            && py >= self.y as i64
            && px < self.x as i64 + self.width as i64
            && py < self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Information about a connected monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorInfo {
    /// Monitor name/identifier.
    pub name: String,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Refresh rate in Hz.
    pub refresh_rate_hz: u32,
    /// Whether this monitor is primary.
    pub primary: bool,
}

impl MonitorInfo {
    /// Monitor bounds in the virtual desktop.
    pub fn frame(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Pixel width of a capture of this monitor (size × backing scale).
    pub fn capture_width(&self) -> u32 {
        (self.width as f64 * self.scale_factor).round() as u32
    }

    /// Pixel height of a capture of this monitor (size × backing scale).
    pub fn capture_height(&self) -> u32 {
        (self.height as f64 * self.scale_factor).round() as u32
    }
}

/// An on-screen top-level window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowInfo {
    /// Platform window handle (X11 window id on Linux).
    pub id: u64,
    /// Owning process.
    pub pid: u32,
    /// Window title. Empty for untitled helper windows.
    pub title: String,
    /// Window bounds in the virtual desktop.
    pub frame: Rect,
    /// Whether the window is currently mapped on screen.
    pub on_screen: bool,
}

/// Display server / platform family used for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    Wayland,
    X11,
    #[default]
    Unknown,
}

/// What part of a display ends up in the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentFilter {
    /// The whole display, including every window on it.
    DisplayIncludingWindows {
        display: MonitorInfo,
        windows: Vec<WindowInfo>,
    },
    /// Only the given window.
    SingleWindow { window: WindowInfo },
}

impl ContentFilter {
    /// The target window, if the filter is window-scoped.
    pub fn window(&self) -> Option<&WindowInfo> {
        match self {
            ContentFilter::SingleWindow { window } => Some(window),
            ContentFilter::DisplayIncludingWindows { .. } => None,
        }
    }
}

/// Immutable description of what to capture and at which geometry.
///
/// Produced once by discovery; the encoder session holds it for its whole
/// lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSource {
    /// Display containing the target window.
    pub display: MonitorInfo,
    /// Window inclusion rule.
    pub filter: ContentFilter,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Minimum interval between delivered frames.
    pub frame_interval: Duration,
    /// Depth of the capture frame queue.
    pub queue_depth: u32,
}

impl CaptureSource {
    /// Build a validated capture source.
    pub fn new(
        display: MonitorInfo,
        filter: ContentFilter,
        width: u32,
        height: u32,
        frame_interval: Duration,
        queue_depth: u32,
    ) -> PidrecResult<Self> {
        if width == 0 || height == 0 {
            return Err(PidrecError::config(format!(
                "Invalid capture geometry {width}x{height}"
            )));
        }
        if frame_interval.is_zero() {
            return Err(PidrecError::config("Frame interval must be non-zero"));
        }
        if queue_depth == 0 {
            return Err(PidrecError::config("Queue depth must be at least 1"));
        }
        Ok(Self {
            display,
            filter,
            width,
            height,
            frame_interval,
            queue_depth,
        })
    }

    /// Frame interval for a target rate in frames per second.
    pub fn interval_for_fps(fps: u32) -> Duration {
        Duration::from_nanos(1_000_000_000 / fps.max(1) as u64)
    }

    /// Target frame rate, rounded to the nearest integer.
    pub fn fps(&self) -> u32 {
        (1.0 / self.frame_interval.as_secs_f64()).round() as u32
    }
}

/// Options that shape how a process is bound to a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Target frame rate.
    pub fps: u32,
    /// Capture frame queue depth.
    pub queue_depth: u32,
    /// Record only the target window instead of its whole display.
    pub window_only: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fps: 60,
            queue_depth: 6,
            window_only: false,
        }
    }
}

/// Binds a process identifier to something recordable.
pub trait SourceResolver {
    /// Find the first on-screen titled window owned by `pid` and the display
    /// containing it.
    fn resolve(&self, pid: u32, options: &ResolveOptions) -> PidrecResult<CaptureSource>;
}
