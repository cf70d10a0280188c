//! Shared GStreamer plumbing for the capture and writer backends.

use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use gst::prelude::*;
use gstreamer as gst;
use pidrec_common::error::{PidrecError, PidrecResult};

/// Initialize GStreamer once per process.
pub fn init_gstreamer() -> PidrecResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(PidrecError::platform(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Build a pipeline from a launch string.
pub fn launch_pipeline(name: &str, launch: &str) -> PidrecResult<gst::Pipeline> {
    init_gstreamer()?;
    tracing::debug!(pipeline = name, %launch, "Building pipeline");

    let element = gst::parse::launch(launch)
        .map_err(|e| PidrecError::platform(format!("Failed to build {name} pipeline: {e}")))?;

    element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
        PidrecError::platform(format!("{name} launch string did not produce a pipeline"))
    })
}

/// Look up a named element and cast it to its concrete type.
pub fn element_by_name<T: IsA<gst::Element>>(
    pipeline: &gst::Pipeline,
    name: &str,
) -> PidrecResult<T> {
    pipeline
        .by_name(name)
        .ok_or_else(|| PidrecError::platform(format!("Pipeline has no element named '{name}'")))?
        .dynamic_cast::<T>()
        .map_err(|_| PidrecError::platform(format!("Element '{name}' has an unexpected type")))
}

/// Terminal bus message observed while draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOutcome {
    Eos,
    Error(String),
    TimedOut,
}

/// Pop bus messages until EOS, an error, or the deadline.
pub fn wait_for_eos(bus: &gst::Bus, timeout: Duration) -> BusOutcome {
    let start = Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return BusOutcome::TimedOut;
        }
        let remaining = gst::ClockTime::from_nseconds((timeout - elapsed).as_nanos() as u64);
        match bus.timed_pop(remaining) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => return BusOutcome::Eos,
                gst::MessageView::Error(e) => {
                    return BusOutcome::Error(describe_error(e));
                }
                _ => {}
            },
            None => return BusOutcome::TimedOut,
        }
    }
}

/// Human-readable text for a bus error message.
pub fn describe_error(e: &gst::message::Error) -> String {
    match e.debug() {
        Some(debug) => format!("{} ({debug})", e.error()),
        None => e.error().to_string(),
    }
}

/// `ximagesrc` region properties for a display at `(x, y)` of the given size.
///
/// The end coordinates are inclusive.
pub fn x11_capture_region_fragment(
    capture_region: Option<(i32, i32, u32, u32)>,
) -> PidrecResult<String> {
    let Some((x, y, width, height)) = capture_region else {
        return Ok(String::new());
    };

    if width == 0 || height == 0 {
        return Err(PidrecError::capture(format!(
            "Invalid X11 capture region {width}x{height} at ({x},{y})"
        )));
    }

    let width_i32 = i32::try_from(width)
        .map_err(|_| PidrecError::capture(format!("X11 capture width too large: {width}")))?;
    let height_i32 = i32::try_from(height)
        .map_err(|_| PidrecError::capture(format!("X11 capture height too large: {height}")))?;

    let endx = x
        .checked_add(width_i32 - 1)
        .ok_or_else(|| PidrecError::capture("X11 capture region x-range overflow"))?;
    let endy = y
        .checked_add(height_i32 - 1)
        .ok_or_else(|| PidrecError::capture("X11 capture region y-range overflow"))?;

    Ok(format!(" startx={x} starty={y} endx={endx} endy={endy}"))
}

/// Quote a filesystem path for use inside a launch string.
pub fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x11_region_fragment_uses_inclusive_end_coordinates() {
        let fragment = x11_capture_region_fragment(Some((2560, 0, 2560, 1440))).unwrap();
        assert_eq!(
            fragment,
            " startx=2560 starty=0 endx=5119 endy=1439".to_string()
        );
    }

    #[test]
    fn x11_region_fragment_rejects_zero_size() {
        let err = x11_capture_region_fragment(Some((0, 0, 0, 1080))).unwrap_err();
        assert!(err.to_string().contains("Invalid X11 capture region"));
    }

    #[test]
    fn x11_region_fragment_is_empty_without_region() {
        assert_eq!(x11_capture_region_fragment(None).unwrap(), "");
    }

    #[test]
    fn escape_path_quotes_double_quotes() {
        assert_eq!(
            escape_path(Path::new("/tmp/a \"b\".mp4")),
            "/tmp/a \\\"b\\\".mp4"
        );
    }
}
