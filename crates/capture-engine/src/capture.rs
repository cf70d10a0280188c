//! Capture stream abstraction.
//!
//! A [`CaptureStream`] delivers frames for a [`CaptureSource`] into a
//! [`FrameSink`]. The encoder session registers the sink, starts capture,
//! and later stops it; the intake worker may also cut capture short
//! through a [`CaptureControl`] handle when the writer fails.
//!
//! [`CaptureSource`]: pidrec_platform_core::CaptureSource

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use pidrec_common::error::{PidrecError, PidrecResult};

use crate::frame::Frame;
use crate::intake::IntakeMessage;

/// Completion callback for [`CaptureStream::stop_capture`].
pub type StopCallback = Box<dyn FnOnce(PidrecResult<()>) + Send>;

/// Handle the capture subsystem pushes frames into.
#[derive(Clone)]
pub struct FrameSink {
    tx: Sender<IntakeMessage>,
    overflow: Arc<AtomicU64>,
}

impl FrameSink {
    pub(crate) fn new(tx: Sender<IntakeMessage>) -> Self {
        Self {
            tx,
            overflow: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hand a frame to the intake without blocking.
    ///
    /// Returns `false` if the intake queue is full (the frame is discarded
    /// and counted as an overflow) or intake has shut down.
    pub fn push(&self, frame: Frame) -> bool {
        match self.tx.try_send(IntakeMessage::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.overflow.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(total, "Intake queue full; frame discarded at capture");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Hand a frame to the intake, waiting for queue space.
    ///
    /// For sources that pace themselves and must not lose frames (file or
    /// scripted sources). Live capture should use [`push`](Self::push).
    pub fn send(&self, frame: Frame) -> PidrecResult<()> {
        self.tx
            .send(IntakeMessage::Frame(frame))
            .map_err(|_| PidrecError::capture("Frame intake has shut down"))
    }

    /// Frames discarded because the intake queue was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

/// Out-of-band control over a running capture.
pub trait CaptureControl: Send + Sync {
    /// Ask capture to stop as soon as possible. Does not wait and may be
    /// called more than once.
    fn request_stop(&self);
}

/// A capture control that does nothing, for streams that cannot be cut short.
#[derive(Debug, Default)]
pub struct NoopControl;

impl CaptureControl for NoopControl {
    fn request_stop(&self) {}
}

/// A source of frames for one [`CaptureSource`](pidrec_platform_core::CaptureSource).
pub trait CaptureStream: Send {
    /// Register the frame sink. Must be called before [`start_capture`](Self::start_capture).
    fn add_output(&mut self, sink: FrameSink) -> PidrecResult<()>;

    /// Begin delivering frames.
    fn start_capture(&mut self) -> PidrecResult<()>;

    /// Stop delivering frames. `on_done` fires exactly once after the last
    /// frame has been pushed into the sink; immediately if capture never
    /// started or was already stopped.
    fn stop_capture(&mut self, on_done: StopCallback);

    /// Handle used by the intake worker to cancel capture.
    fn control(&self) -> Arc<dyn CaptureControl>;
}
