//! Serial frame intake.
//!
//! The capture subsystem pushes frames into a bounded channel; one
//! dedicated worker thread drains it in delivery order and is the only
//! code that touches the writer while recording. Every branch completes
//! without waiting on encoder I/O: when the track input is not ready the
//! frame is dropped and counted, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use pidrec_common::error::{PidrecError, PidrecResult};

use crate::capture::CaptureControl;
use crate::frame::Frame;
use crate::latch::CompletionLatch;
use crate::writer::{MediaWriter, WriterStatus};

/// How long the worker waits for the writer when it finalizes on its own.
const UNATTENDED_FINALIZE_TIMEOUT: Duration = Duration::from_secs(15);

/// Messages carried by the intake channel.
pub(crate) enum IntakeMessage {
    Frame(Frame),
    /// Capture has stopped. Processed after every frame queued before it.
    Finish {
        on_finalized: Box<dyn FnOnce() + Send>,
    },
}

/// Counters kept by the intake worker.
///
/// For valid frames that arrive while the writer is `Writing`:
/// `appended + dropped + malformed + append_failures == delivered - rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Valid frames handed to the intake.
    pub delivered: u64,
    /// Frames accepted by the track input.
    pub appended: u64,
    /// Frames discarded because the track input was not ready (backpressure).
    pub dropped: u64,
    /// Frames discarded for missing or empty content-rectangle metadata.
    pub malformed: u64,
    /// Frames the track input refused on append.
    pub append_failures: u64,
    /// Frames that arrived while the writer was not `Writing`.
    pub rejected: u64,
    /// Frames the capture subsystem marked invalid.
    pub invalid: u64,
    /// Presentation timestamp that seeded the muxer session.
    pub session_origin: Option<Duration>,
    /// Presentation timestamp of the most recent frame the encoder was ready for.
    pub last_pts: Option<Duration>,
}

impl IntakeStats {
    /// Span of the media timeline written so far.
    pub fn media_duration(&self) -> Option<Duration> {
        Some(self.last_pts?.saturating_sub(self.session_origin?))
    }
}

/// Frame-intake state machine. Owns the writer for the whole recording.
pub struct FrameIntake {
    writer: Box<dyn MediaWriter>,
    control: Arc<dyn CaptureControl>,
    stats: IntakeStats,
    dropped: Arc<AtomicU64>,
    capture_cancelled: bool,
}

impl FrameIntake {
    pub fn new(writer: Box<dyn MediaWriter>, control: Arc<dyn CaptureControl>) -> Self {
        Self {
            writer,
            control,
            stats: IntakeStats::default(),
            dropped: Arc::new(AtomicU64::new(0)),
            capture_cancelled: false,
        }
    }

    /// Process one delivered frame.
    pub fn handle(&mut self, frame: Frame) {
        if !frame.valid {
            self.stats.invalid += 1;
            tracing::trace!(pts = ?frame.pts, "Ignoring invalid frame");
            return;
        }
        self.stats.delivered += 1;

        match self.writer.status() {
            WriterStatus::Writing => self.accept(frame),
            WriterStatus::Failed => {
                self.stats.rejected += 1;
                self.cancel_capture();
            }
            status => {
                self.stats.rejected += 1;
                tracing::warn!(
                    ?status,
                    "Received frame while writer is in an unexpected state; dropping frame"
                );
            }
        }
    }

    fn accept(&mut self, frame: Frame) {
        // A frame without its content rectangle fails inside the muxer, so it
        // never seeds the session and never reaches `append`.
        let well_formed = frame.content_rect().is_some();
        if well_formed && self.stats.session_origin.is_none() {
            self.writer.start_session(frame.pts);
            self.stats.session_origin = Some(frame.pts);
            tracing::info!(origin = ?frame.pts, "Muxer session started");
        }

        if !self.writer.is_ready_for_more_media_data() {
            self.stats.dropped += 1;
            self.dropped.store(self.stats.dropped, Ordering::Relaxed);
            tracing::debug!(pts = ?frame.pts, dropped = self.stats.dropped, "Encoder busy; dropping frame");
            return;
        }

        let pts = frame.pts;
        self.stats.last_pts = Some(pts);
        if !well_formed {
            self.stats.malformed += 1;
            tracing::warn!(?pts, "Frame has no content rectangle; skipping");
            return;
        }

        if self.writer.append(frame) {
            self.stats.appended += 1;
        } else {
            self.stats.append_failures += 1;
            tracing::warn!(?pts, error = ?self.writer.error(), "Failed to append frame");
        }
    }

    fn cancel_capture(&mut self) {
        if self.capture_cancelled {
            return;
        }
        self.capture_cancelled = true;
        tracing::error!(
            error = self.writer.error().as_deref().unwrap_or("unknown"),
            "Writer failed; stopping capture prematurely"
        );
        self.control.request_stop();
    }

    /// Close the track input and ask the writer to finalize the file.
    pub fn finish(&mut self, on_finalized: Box<dyn FnOnce() + Send>) {
        tracing::debug!(
            appended = self.stats.appended,
            status = ?self.writer.status(),
            "Finishing writer"
        );
        self.writer.mark_input_finished();
        self.writer.finish_writing(on_finalized);
    }

    pub fn stats(&self) -> &IntakeStats {
        &self.stats
    }

    /// Whether the intake asked capture to stop after a writer failure.
    pub fn capture_cancelled(&self) -> bool {
        self.capture_cancelled
    }

    /// Backpressure drop counter, readable from other threads.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }

    pub fn into_parts(self) -> (IntakeStats, Box<dyn MediaWriter>) {
        (self.stats, self.writer)
    }
}

/// What the worker hands back when it exits.
pub(crate) struct IntakeOutcome {
    pub stats: IntakeStats,
    pub writer: Box<dyn MediaWriter>,
}

/// The single intake thread.
pub(crate) struct IntakeWorker {
    handle: JoinHandle<IntakeOutcome>,
}

impl IntakeWorker {
    pub(crate) fn spawn(intake: FrameIntake, rx: Receiver<IntakeMessage>) -> PidrecResult<Self> {
        let handle = std::thread::Builder::new()
            .name("frame-intake".to_string())
            .spawn(move || run_intake(intake, rx))
            .map_err(|e| PidrecError::capture(format!("Failed to spawn frame intake worker: {e}")))?;

        Ok(Self { handle })
    }

    pub(crate) fn join(self) -> PidrecResult<IntakeOutcome> {
        self.handle
            .join()
            .map_err(|_| PidrecError::capture("Frame intake worker panicked"))
    }
}

fn run_intake(mut intake: FrameIntake, rx: Receiver<IntakeMessage>) -> IntakeOutcome {
    tracing::debug!("Frame intake worker started");

    let mut finished = false;
    for message in rx.iter() {
        match message {
            IntakeMessage::Frame(frame) => intake.handle(frame),
            IntakeMessage::Finish { on_finalized } => {
                intake.finish(on_finalized);
                finished = true;
                break;
            }
        }
    }

    if !finished {
        tracing::warn!("Intake channel closed without a finish request; finalizing output");
        let latch = CompletionLatch::new(1);
        let finalized = latch.count_down_on_drop();
        intake.finish(Box::new(move || drop(finalized)));
        if !latch.wait_timeout(UNATTENDED_FINALIZE_TIMEOUT) {
            tracing::warn!(
                timeout = ?UNATTENDED_FINALIZE_TIMEOUT,
                "Writer did not report completion; output may be truncated"
            );
        }
    }

    let (stats, writer) = intake.into_parts();
    tracing::debug!(
        delivered = stats.delivered,
        appended = stats.appended,
        dropped = stats.dropped,
        "Frame intake worker stopped"
    );
    IntakeOutcome { stats, writer }
}
