//! pidrec Capture Engine
//!
//! Streams live window capture into an MP4/H.264 file. Frames arrive from
//! the capture subsystem at whatever rate it manages, pass through a single
//! serial intake worker that applies the drop-on-backpressure policy, and
//! are appended to the muxer in delivery order. Stopping drains the queue
//! and blocks until the file is finalized.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    EncoderSession                    │
//! │  ┌───────────────┐   bounded    ┌─────────────────┐  │
//! │  │ CaptureStream │──channel───▶│  frame-intake   │  │
//! │  │  (ximagesrc)  │  FrameSink   │  (FrameIntake)  │  │
//! │  └───────▲───────┘              └────────┬────────┘  │
//! │          │ request_stop on failure       │ append    │
//! │          └───────────────────────────────┤           │
//! │                                          ▼           │
//! │                                 ┌─────────────────┐  │
//! │                                 │   MediaWriter   │  │
//! │                                 │ (mp4mux, x264)  │  │
//! │                                 └────────┬────────┘  │
//! │                                          ▼           │
//! │                                       out.mp4        │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod capture;
pub mod frame;
pub mod intake;
pub mod latch;
pub mod pipeline;
pub mod session;
pub mod writer;

pub use capture::{CaptureControl, CaptureStream, FrameSink, NoopControl, StopCallback};
pub use frame::{Frame, FrameInfo};
pub use intake::{FrameIntake, IntakeStats};
pub use latch::CompletionLatch;
pub use session::{EncoderSession, SessionReport, SessionState};
pub use writer::{MediaWriter, VideoTrackSettings, WriterStatus};
