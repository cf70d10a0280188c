//! X11 display and window capture through `ximagesrc` into an `appsink`.

use std::sync::Arc;
use std::time::Duration;

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::{CaptureSource, ContentFilter, Rect};

use crate::capture::{CaptureControl, CaptureStream, FrameSink, StopCallback};
use crate::frame::Frame;
use crate::pipeline::{
    describe_error, element_by_name, launch_pipeline, wait_for_eos, x11_capture_region_fragment,
    BusOutcome,
};

/// How long stop waits for in-flight frames to reach the sink.
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// X11 capture through `ximagesrc`, delivering packed BGRx frames scaled to
/// the source's capture size.
pub struct GstWindowCapture {
    source: CaptureSource,
    pipeline: gst::Pipeline,
    appsink: AppSink,
    sink: Option<FrameSink>,
    running: bool,
}

impl GstWindowCapture {
    pub fn new(source: &CaptureSource) -> PidrecResult<Self> {
        let launch = x11_launch(source)?;
        let pipeline = launch_pipeline("x11-capture", &launch)?;
        let appsink: AppSink = element_by_name(&pipeline, "frames")?;

        Ok(Self {
            source: source.clone(),
            pipeline,
            appsink,
            sink: None,
            running: false,
        })
    }

    fn drain_and_stop(&self) -> PidrecResult<()> {
        let mut result = Ok(());

        let (_, current, _) = self.pipeline.state(gst::ClockTime::ZERO);
        if current == gst::State::Playing && self.pipeline.send_event(gst::event::Eos::new()) {
            if let Some(bus) = self.pipeline.bus() {
                match wait_for_eos(&bus, STOP_DRAIN_TIMEOUT) {
                    BusOutcome::Eos => {}
                    BusOutcome::Error(e) => result = Err(PidrecError::capture(e)),
                    BusOutcome::TimedOut => tracing::warn!(
                        timeout = ?STOP_DRAIN_TIMEOUT,
                        "Capture did not drain before stop; trailing frames may be lost"
                    ),
                }
            }
        } else if let Some(bus) = self.pipeline.bus() {
            // A capture that died mid-recording leaves its error on the bus.
            if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
                if let gst::MessageView::Error(e) = msg.view() {
                    result = Err(PidrecError::capture(describe_error(e)));
                }
            }
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| PidrecError::capture(format!("Failed to stop capture pipeline: {e:?}")))?;
        result
    }
}

fn x11_launch(source: &CaptureSource) -> PidrecResult<String> {
    let target = match &source.filter {
        ContentFilter::SingleWindow { window } => format!(" xid={}", window.id),
        ContentFilter::DisplayIncludingWindows { display, .. } => x11_capture_region_fragment(
            Some((display.x, display.y, display.width, display.height)),
        )?,
    };

    Ok(format!(
        "ximagesrc use-damage=false show-pointer=true{target} \
         ! videoconvert ! videoscale \
         ! videorate drop-only=true max-rate={fps} \
         ! video/x-raw,format=BGRx,width={width},height={height},pixel-aspect-ratio=1/1 \
         ! appsink name=frames max-buffers={depth} drop=true sync=false",
        fps = source.fps(),
        width = source.width,
        height = source.height,
        depth = source.queue_depth.max(1),
    ))
}

/// Convert an appsink sample into a [`Frame`].
///
/// Samples with no timestamp, flagged as corrupt or gap, or whose memory
/// cannot be mapped become invalid frames.
fn frame_from_sample(sample: &gst::Sample) -> Frame {
    let Some(buffer) = sample.buffer() else {
        return Frame::invalid(Duration::ZERO);
    };
    let Some(pts) = buffer.pts() else {
        return Frame::invalid(Duration::ZERO);
    };
    let pts = Duration::from_nanos(pts.nseconds());

    if buffer
        .flags()
        .intersects(gst::BufferFlags::CORRUPTED | gst::BufferFlags::GAP)
    {
        return Frame::invalid(pts);
    }
    let Ok(map) = buffer.map_readable() else {
        return Frame::invalid(pts);
    };

    let frame = Frame::new(pts, map.as_slice().to_vec());
    match sample.caps().and_then(caps_dimensions) {
        Some((width, height)) => frame.with_content_rect(Rect::new(0, 0, width, height)),
        None => frame,
    }
}

fn caps_dimensions(caps: &gst::CapsRef) -> Option<(u32, u32)> {
    let structure = caps.structure(0)?;
    let width = structure.get::<i32>("width").ok()?;
    let height = structure.get::<i32>("height").ok()?;
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

impl CaptureStream for GstWindowCapture {
    fn add_output(&mut self, sink: FrameSink) -> PidrecResult<()> {
        if self.running {
            return Err(PidrecError::invalid_state(
                "Cannot register a frame sink on a running capture",
            ));
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn start_capture(&mut self) -> PidrecResult<()> {
        if self.running {
            return Err(PidrecError::invalid_state("Capture already running"));
        }
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| PidrecError::capture("No frame sink registered"))?;

        self.appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    sink.push(frame_from_sample(&sample));
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        if let Err(e) = self.pipeline.set_state(gst::State::Playing) {
            let _ = self.pipeline.set_state(gst::State::Null);
            return Err(PidrecError::capture(format!(
                "Failed to start X11 capture: {e:?}"
            )));
        }
        self.running = true;

        tracing::info!(
            width = self.source.width,
            height = self.source.height,
            fps = self.source.fps(),
            window_only = matches!(self.source.filter, ContentFilter::SingleWindow { .. }),
            "X11 capture started"
        );
        Ok(())
    }

    fn stop_capture(&mut self, on_done: StopCallback) {
        if !self.running {
            on_done(Ok(()));
            return;
        }
        self.running = false;
        let result = self.drain_and_stop();
        tracing::info!(ok = result.is_ok(), "X11 capture stopped");
        on_done(result);
    }

    fn control(&self) -> Arc<dyn CaptureControl> {
        Arc::new(GstCaptureControl {
            pipeline: self.pipeline.downgrade(),
        })
    }
}

impl Drop for GstWindowCapture {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Cuts a running capture short from any thread.
struct GstCaptureControl {
    pipeline: glib::WeakRef<gst::Pipeline>,
}

impl CaptureControl for GstCaptureControl {
    fn request_stop(&self) {
        let Some(pipeline) = self.pipeline.upgrade() else {
            return;
        };
        tracing::info!("Capture stop requested");
        pipeline.call_async(|pipeline| {
            let _ = pipeline.set_state(gst::State::Null);
        });
    }
}
