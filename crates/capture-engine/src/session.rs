//! Streaming encoder session.
//!
//! Ties one [`CaptureStream`] to one [`MediaWriter`] through the serial
//! frame intake. The control thread only ever calls [`EncoderSession::start`]
//! and [`EncoderSession::stop`]; the writer lives on the intake worker in
//! between and comes back when the worker exits.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use pidrec_common::clock::{DriftMeasurement, RecordingClock};
use pidrec_common::config::EncoderDefaults;
use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::CaptureSource;

use crate::backend;
use crate::capture::{CaptureStream, FrameSink};
use crate::intake::{FrameIntake, IntakeMessage, IntakeWorker};
use crate::latch::{CompletionLatch, CountDownGuard};
use crate::writer::{remove_stale_output, MediaWriter, WriterStatus};

/// Media timeline shorter than wall-clock capture time by more than this is
/// reported as a stall.
const DRIFT_WARN_THRESHOLD_MS: f64 = 500.0;

/// Lifecycle of an encoder session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Writer open, capture not started.
    Idle,
    /// Capture running, frames flowing into the writer.
    Capturing,
    /// Capture stopped and the output finalized. Inert.
    Finalized,
}

/// Outcome of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub output: PathBuf,
    pub appended: u64,
    /// Frames discarded because the encoder was not ready.
    pub dropped: u64,
    /// Frames skipped for missing content-rectangle metadata.
    pub malformed: u64,
    pub invalid: u64,
    pub append_failures: u64,
    /// Frames that arrived after the writer stopped accepting input.
    pub rejected: u64,
    /// Frames discarded at capture because the intake queue was full.
    pub capture_overflows: u64,
    /// Last accepted presentation timestamp minus the session origin.
    pub media_duration: Option<Duration>,
    /// Wall-clock time between `start()` and the end of `stop()`.
    pub wall_duration: Duration,
    pub writer_status: WriterStatus,
    pub writer_error: Option<String>,
}

impl SessionReport {
    /// Whether the writer finalized the file cleanly.
    pub fn is_complete(&self) -> bool {
        self.writer_status == WriterStatus::Finalized
    }

    /// Human-readable result lines for the console.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("wrote: {}", self.output.display())];
        if self.dropped > 0 {
            lines.push(format!("dropped frames: {}", self.dropped));
        }
        if self.malformed > 0 {
            lines.push(format!("skipped malformed frames: {}", self.malformed));
        }
        if self.capture_overflows > 0 {
            lines.push(format!(
                "frames lost to a full capture queue: {}",
                self.capture_overflows
            ));
        }
        if self.writer_status == WriterStatus::Failed {
            lines.push(format!(
                "writer failed: {}",
                self.writer_error.as_deref().unwrap_or("unknown error")
            ));
        }
        lines
    }
}

/// One recording: a capture stream feeding one output file.
pub struct EncoderSession {
    source: CaptureSource,
    output: PathBuf,
    state: SessionState,
    stream: Box<dyn CaptureStream>,
    sink: FrameSink,
    intake_tx: Sender<IntakeMessage>,
    worker: Option<IntakeWorker>,
    dropped: Arc<AtomicU64>,
    clock: Option<RecordingClock>,
}

impl EncoderSession {
    /// Open the platform writer and capture stream for `source`.
    ///
    /// Any file already at `output` is removed. Failing to open the muxer
    /// is fatal for the session.
    pub fn create(
        source: CaptureSource,
        output: impl AsRef<Path>,
        defaults: &EncoderDefaults,
    ) -> PidrecResult<Self> {
        let output = output.as_ref();
        let writer = backend::open_writer(output, &source, defaults)?;
        let stream = backend::open_capture(&source)?;
        Self::with_parts(source, writer, stream)
    }

    /// Build a session around injected collaborators.
    ///
    /// The output path is taken from the writer. A stale file at that path
    /// is removed before the writer starts.
    pub fn with_parts(
        source: CaptureSource,
        mut writer: Box<dyn MediaWriter>,
        stream: Box<dyn CaptureStream>,
    ) -> PidrecResult<Self> {
        let output = writer.output_path().to_path_buf();
        remove_stale_output(&output);

        match writer.status() {
            WriterStatus::Unstarted => writer.start_writing()?,
            WriterStatus::Writing => {}
            status => {
                return Err(PidrecError::encoder(format!(
                    "Writer for {} is not usable ({status:?})",
                    output.display()
                )))
            }
        }

        let depth = source.queue_depth.max(1) as usize;
        let (intake_tx, intake_rx) = crossbeam_channel::bounded(depth);
        let intake = FrameIntake::new(writer, stream.control());
        let dropped = intake.dropped_counter();
        let worker = IntakeWorker::spawn(intake, intake_rx)?;

        tracing::info!(
            output = %output.display(),
            width = source.width,
            height = source.height,
            queue_depth = depth,
            "Encoder session created"
        );

        Ok(Self {
            sink: FrameSink::new(intake_tx.clone()),
            source,
            output,
            state: SessionState::Idle,
            stream,
            intake_tx,
            worker: Some(worker),
            dropped,
            clock: None,
        })
    }

    /// Register the frame sink and begin capture.
    ///
    /// A capture that refuses the sink or fails to start is logged and
    /// tolerated: the recording then holds no frames and `stop()` still
    /// produces a finalized file.
    pub fn start(&mut self) -> PidrecResult<()> {
        if self.state != SessionState::Idle {
            return Err(PidrecError::invalid_state(format!(
                "Cannot start a session that is {:?}",
                self.state
            )));
        }

        let started = self
            .stream
            .add_output(self.sink.clone())
            .and_then(|()| self.stream.start_capture());
        if let Err(e) = started {
            tracing::error!(error = %e, "Failed to start capture; the recording will contain no frames");
        }

        let clock = RecordingClock::start();
        tracing::info!(
            fps = self.source.fps(),
            started_at = clock.epoch_wall(),
            "Recording started"
        );
        self.clock = Some(clock);
        self.state = SessionState::Capturing;
        Ok(())
    }

    /// Stop capture, drain queued frames, and finalize the output.
    ///
    /// Blocks until both capture and the writer have reported completion.
    pub fn stop(&mut self) -> PidrecResult<SessionReport> {
        match self.state {
            SessionState::Capturing => {}
            SessionState::Idle => {
                return Err(PidrecError::invalid_state(
                    "Cannot stop a session that was never started",
                ))
            }
            SessionState::Finalized => {
                return Err(PidrecError::invalid_state("Session already stopped"))
            }
        }
        self.state = SessionState::Finalized;
        let worker = self
            .worker
            .take()
            .ok_or_else(|| PidrecError::invalid_state("Frame intake is not running"))?;

        tracing::info!("Stopping capture");
        let latch = CompletionLatch::new(2);
        let capture_stopped = latch.count_down_on_drop();
        let finish = FinishRequest {
            tx: self.intake_tx.clone(),
            on_finalized: Some(latch.count_down_on_drop()),
        };

        self.stream.stop_capture(Box::new(move |result| {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Capture stopped with an error; finalizing anyway");
            }
            // Queued behind every frame capture delivered before stopping.
            drop(finish);
            drop(capture_stopped);
        }));

        latch.wait();
        let outcome = worker.join()?;

        let wall_duration = self
            .clock
            .as_ref()
            .map(RecordingClock::elapsed)
            .unwrap_or_default();
        let stats = outcome.stats;
        let media_duration = stats.media_duration();
        if let Some(media) = media_duration {
            let drift = DriftMeasurement::between(wall_duration, media);
            if drift.exceeds_threshold_ms(DRIFT_WARN_THRESHOLD_MS) {
                tracing::warn!(
                    drift_ms = drift.drift_ms(),
                    "Media timeline diverges from wall-clock capture time"
                );
            }
        }

        let report = SessionReport {
            output: self.output.clone(),
            appended: stats.appended,
            dropped: stats.dropped,
            malformed: stats.malformed,
            invalid: stats.invalid,
            append_failures: stats.append_failures,
            rejected: stats.rejected,
            capture_overflows: self.sink.overflow_count(),
            media_duration,
            wall_duration,
            writer_status: outcome.writer.status(),
            writer_error: outcome.writer.error(),
        };

        tracing::info!(
            output = %report.output.display(),
            appended = report.appended,
            dropped = report.dropped,
            status = ?report.writer_status,
            "Recording finalized"
        );
        Ok(report)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames dropped for backpressure so far. Safe to poll while recording.
    pub fn dropped_frame_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn source(&self) -> &CaptureSource {
        &self.source
    }
}

/// Asks the intake worker to finalize once dropped.
///
/// Held by the stop callback, so the request is queued whether the capture
/// stream calls the callback or drops it.
struct FinishRequest {
    tx: Sender<IntakeMessage>,
    on_finalized: Option<CountDownGuard>,
}

impl Drop for FinishRequest {
    fn drop(&mut self) {
        let Some(guard) = self.on_finalized.take() else {
            return;
        };
        let finish = IntakeMessage::Finish {
            on_finalized: Box::new(move || drop(guard)),
        };
        if self.tx.send(finish).is_err() {
            tracing::warn!("Frame intake already exited before finish request");
        }
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if self.state == SessionState::Capturing {
            tracing::warn!("Encoder session dropped while capturing; finalizing output");
            if let Err(e) = self.stop() {
                tracing::error!(error = %e, "Failed to finalize output on drop");
            }
        }
    }
}
