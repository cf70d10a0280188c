//! MP4/H.264 writer on a GStreamer `appsrc` pipeline.
//!
//! ```text
//! appsrc (BGRx, live, variable rate)
//!   → queue → videoconvert → I420
//!   → x264enc → h264parse → mp4mux → filesink
//! ```
//!
//! Readiness follows `appsrc`'s need-data/enough-data signals. A bus
//! watcher thread moves the writer to `Failed` on a pipeline error and to
//! `Finalized` once EOS has drained through the muxer. The muxer writes
//! fragmented MP4, so an output cut short by a pipeline error or a drain
//! timeout still plays up to its last complete fragment.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app::{AppSrc, AppSrcCallbacks};
use pidrec_common::error::{PidrecError, PidrecResult};

use crate::frame::Frame;
use crate::pipeline::{describe_error, element_by_name, escape_path, launch_pipeline};
use crate::writer::{MediaWriter, VideoTrackSettings, WriterStatus};

/// How long EOS may take to drain through the encoder and muxer.
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Length of each MP4 fragment written to disk.
const FRAGMENT_DURATION: Duration = Duration::from_secs(1);

/// Raw frames `appsrc` may hold before it reports it has enough.
const INPUT_QUEUE_FRAMES: usize = 4;

struct WriterState {
    status: WriterStatus,
    error: Option<String>,
    on_finalized: Option<Box<dyn FnOnce() + Send>>,
    finalize_deadline: Option<Instant>,
}

struct Shared {
    state: Mutex<WriterState>,
    ready: AtomicBool,
    shutdown: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// GStreamer-backed [`MediaWriter`] producing an MP4 file with one H.264 track.
pub struct GstMp4Writer {
    path: PathBuf,
    settings: VideoTrackSettings,
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    shared: Arc<Shared>,
    origin: Option<Duration>,
    input_finished: bool,
    bus_watch: Option<JoinHandle<()>>,
}

impl GstMp4Writer {
    /// Build the muxer pipeline for `path`. Nothing touches the file until
    /// [`start_writing`](MediaWriter::start_writing).
    pub fn open(path: &Path, settings: VideoTrackSettings) -> PidrecResult<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(PidrecError::encoder(format!(
                "Invalid track geometry {}x{}",
                settings.width, settings.height
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(PidrecError::encoder(format!(
                    "Output directory {} does not exist",
                    parent.display()
                )));
            }
        }

        let launch = mp4_launch(path, &settings);
        let pipeline = launch_pipeline("mp4-writer", &launch)?;
        let appsrc: AppSrc = element_by_name(&pipeline, "video_in")?;
        appsrc.set_max_bytes((settings.frame_size() * INPUT_QUEUE_FRAMES) as u64);

        let shared = Arc::new(Shared {
            state: Mutex::new(WriterState {
                status: WriterStatus::Unstarted,
                error: None,
                on_finalized: None,
                finalize_deadline: None,
            }),
            ready: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        });

        let need = shared.clone();
        let enough = shared.clone();
        appsrc.set_callbacks(
            AppSrcCallbacks::builder()
                .need_data(move |_, _| need.ready.store(true, Ordering::Release))
                .enough_data(move |_| enough.ready.store(false, Ordering::Release))
                .build(),
        );

        Ok(Self {
            path: path.to_path_buf(),
            settings,
            pipeline,
            appsrc,
            shared,
            origin: None,
            input_finished: false,
            bus_watch: None,
        })
    }
}

fn mp4_launch(path: &Path, settings: &VideoTrackSettings) -> String {
    let live = settings.expects_media_in_real_time;
    let tune = if live { " tune=zerolatency" } else { "" };
    let location = escape_path(path);
    format!(
        "appsrc name=video_in format=time is-live={live} do-timestamp=false block=false \
         caps=\"video/x-raw,format=BGRx,width={width},height={height},framerate=0/1,pixel-aspect-ratio=1/1\" \
         ! queue ! videoconvert ! video/x-raw,format=I420 \
         ! x264enc{tune} speed-preset={preset} key-int-max={keyint} \
         ! h264parse ! mp4mux fragment-duration={fragment_ms} ! filesink location=\"{location}\"",
        width = settings.width,
        height = settings.height,
        preset = settings.speed_preset,
        keyint = settings.keyframe_interval,
        fragment_ms = FRAGMENT_DURATION.as_millis(),
    )
}

/// Tear the pipeline down and fire the pending completion, if any.
fn settle(pipeline: &gst::Pipeline, shared: &Shared, status: WriterStatus) {
    let _ = pipeline.set_state(gst::State::Null);
    shared.ready.store(false, Ordering::Release);
    let callback = {
        let mut state = shared.lock();
        if state.status != WriterStatus::Failed {
            state.status = status;
        }
        state.finalize_deadline = None;
        state.on_finalized.take()
    };
    if let Some(callback) = callback {
        callback();
    }
}

fn watch_bus(pipeline: gst::Pipeline, shared: Arc<Shared>) {
    let Some(bus) = pipeline.bus() else {
        tracing::warn!("Muxer pipeline has no bus; errors will go unnoticed");
        return;
    };

    while !shared.shutdown.load(Ordering::Acquire) {
        match bus.timed_pop(gst::ClockTime::from_mseconds(100)) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::debug!("Muxer drained; output finalized");
                    settle(&pipeline, &shared, WriterStatus::Finalized);
                    return;
                }
                gst::MessageView::Error(e) => {
                    let text = describe_error(e);
                    tracing::error!(error = %text, "Muxer pipeline error");
                    let pending = {
                        let mut state = shared.lock();
                        state.status = WriterStatus::Failed;
                        state.error = Some(text);
                        state.on_finalized.is_some()
                    };
                    shared.ready.store(false, Ordering::Release);
                    if pending {
                        settle(&pipeline, &shared, WriterStatus::Failed);
                    }
                    return;
                }
                _ => {}
            },
            None => {
                let expired = shared
                    .lock()
                    .finalize_deadline
                    .is_some_and(|deadline| Instant::now() >= deadline);
                if expired {
                    tracing::warn!(
                        timeout = ?FINALIZE_TIMEOUT,
                        "Muxer did not drain in time; output may be truncated"
                    );
                    {
                        let mut state = shared.lock();
                        state.status = WriterStatus::Failed;
                        state.error = Some("Timed out waiting for the muxer to drain".to_string());
                    }
                    settle(&pipeline, &shared, WriterStatus::Failed);
                    return;
                }
            }
        }
    }
}

impl MediaWriter for GstMp4Writer {
    fn status(&self) -> WriterStatus {
        self.shared.lock().status
    }

    fn start_writing(&mut self) -> PidrecResult<()> {
        let status = self.status();
        if status != WriterStatus::Unstarted {
            return Err(PidrecError::invalid_state(format!(
                "Writer already started ({status:?})"
            )));
        }

        if let Err(e) = self.pipeline.set_state(gst::State::Playing) {
            let _ = self.pipeline.set_state(gst::State::Null);
            let message = format!(
                "Failed to open muxer for {}: {e:?}",
                self.path.display()
            );
            let mut state = self.shared.lock();
            state.status = WriterStatus::Failed;
            state.error = Some(message.clone());
            return Err(PidrecError::encoder(message));
        }

        self.shared.lock().status = WriterStatus::Writing;

        let pipeline = self.pipeline.clone();
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("mp4-writer-bus".to_string())
            .spawn(move || watch_bus(pipeline, shared))
            .map_err(|e| PidrecError::encoder(format!("Failed to spawn muxer bus watcher: {e}")))?;
        self.bus_watch = Some(handle);

        tracing::info!(
            path = %self.path.display(),
            width = self.settings.width,
            height = self.settings.height,
            "MP4 writer started"
        );
        Ok(())
    }

    fn start_session(&mut self, origin: Duration) {
        self.origin = Some(origin);
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        !self.input_finished
            && self.shared.ready.load(Ordering::Acquire)
            && self.status() == WriterStatus::Writing
    }

    fn append(&mut self, frame: Frame) -> bool {
        if self.input_finished {
            return false;
        }
        let Some(origin) = self.origin else {
            tracing::warn!("Append before the muxer session started");
            return false;
        };

        let expected = self.settings.frame_size();
        if frame.data.len() != expected {
            tracing::warn!(
                len = frame.data.len(),
                expected,
                "Frame size does not match track geometry"
            );
            return false;
        }

        let pts = frame.pts.saturating_sub(origin);
        let mut buffer = gst::Buffer::from_mut_slice(frame.data);
        buffer
            .make_mut()
            .set_pts(gst::ClockTime::from_nseconds(pts.as_nanos() as u64));

        match self.appsrc.push_buffer(buffer) {
            Ok(_) => true,
            Err(flow) => {
                tracing::debug!(?flow, "appsrc refused buffer");
                false
            }
        }
    }

    fn mark_input_finished(&mut self) {
        if self.input_finished {
            return;
        }
        self.input_finished = true;
        self.shared.ready.store(false, Ordering::Release);
        if let Err(flow) = self.appsrc.end_of_stream() {
            tracing::warn!(?flow, "Failed to signal end of stream to the muxer");
        }
    }

    fn finish_writing(&mut self, on_done: Box<dyn FnOnce() + Send>) {
        let mut state = self.shared.lock();
        match state.status {
            WriterStatus::Writing => {
                state.on_finalized = Some(on_done);
                state.finalize_deadline = Some(Instant::now() + FINALIZE_TIMEOUT);
                drop(state);
                self.mark_input_finished();
            }
            WriterStatus::Finalized => {
                drop(state);
                on_done();
            }
            WriterStatus::Unstarted | WriterStatus::Failed => {
                drop(state);
                let _ = self.pipeline.set_state(gst::State::Null);
                on_done();
            }
        }
    }

    fn error(&self) -> Option<String> {
        self.shared.lock().error.clone()
    }

    fn output_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for GstMp4Writer {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        let _ = self.pipeline.set_state(gst::State::Null);
        if let Some(handle) = self.bus_watch.take() {
            let _ = handle.join();
        }
    }
}
