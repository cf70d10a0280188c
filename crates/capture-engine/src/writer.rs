//! Muxer/writer abstraction.
//!
//! A [`MediaWriter`] owns one output container and exactly one video track
//! input. The intake worker appends to it while recording; the session
//! finishes it once intake has stopped.

use std::path::Path;
use std::time::Duration;

use pidrec_common::config::EncoderDefaults;
use pidrec_common::error::{PidrecError, PidrecResult};

use crate::frame::Frame;

/// Writer lifecycle. Frames are appended only in `Writing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStatus {
    /// Created, not yet writing.
    Unstarted,
    /// Accepting samples.
    Writing,
    /// Hit an unrecoverable error.
    Failed,
    /// Output file closed and complete.
    Finalized,
}

/// Video codec of the track input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
}

/// Configuration of the single video track input.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrackSettings {
    pub container: Container,
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Nominal capture rate; used for keyframe spacing, never for pacing.
    pub fps: u32,
    /// Samples arrive live with irregular gaps rather than on a fixed clock.
    pub expects_media_in_real_time: bool,
    /// Encoder speed preset (x264 naming).
    pub speed_preset: String,
    /// Frames between forced keyframes.
    pub keyframe_interval: u32,
}

impl VideoTrackSettings {
    /// Settings for an H.264 track in an MP4 container.
    pub fn h264(width: u32, height: u32, fps: u32) -> Self {
        Self {
            container: Container::Mp4,
            codec: VideoCodec::H264,
            width,
            height,
            fps,
            expects_media_in_real_time: true,
            speed_preset: "veryfast".to_string(),
            keyframe_interval: keyframe_interval(fps, 2),
        }
    }

    /// Settings derived from the encoder section of the config file.
    pub fn from_defaults(
        width: u32,
        height: u32,
        fps: u32,
        defaults: &EncoderDefaults,
    ) -> PidrecResult<Self> {
        if !defaults.container.eq_ignore_ascii_case("mp4") {
            return Err(PidrecError::unsupported(format!(
                "Container '{}' is not supported (only mp4)",
                defaults.container
            )));
        }
        if !defaults.codec.eq_ignore_ascii_case("h264") {
            return Err(PidrecError::unsupported(format!(
                "Codec '{}' is not supported (only h264)",
                defaults.codec
            )));
        }

        let mut settings = Self::h264(width, height, fps);
        settings.speed_preset = defaults.speed_preset.clone();
        settings.keyframe_interval = keyframe_interval(fps, defaults.keyframe_interval_secs);
        Ok(settings)
    }

    /// Size in bytes of one packed BGRx frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Keyframe spacing in frames: `fps * secs`, at least 2.
pub fn keyframe_interval(fps: u32, secs: u32) -> u32 {
    fps.saturating_mul(secs).max(2)
}

/// A muxer with one video track input.
///
/// `append` and readiness checks come from the intake worker; construction,
/// `mark_input_finished` and `finish_writing` happen strictly before intake
/// starts or after it has stopped, so implementations need no internal
/// locking for the track itself.
pub trait MediaWriter: Send {
    /// Current lifecycle state.
    fn status(&self) -> WriterStatus;

    /// Open the output and move to `Writing`.
    fn start_writing(&mut self) -> PidrecResult<()>;

    /// Set the time origin. Output timestamps are `pts - origin`.
    fn start_session(&mut self, origin: Duration);

    /// Whether the track input can take another sample without queueing
    /// beyond its limit.
    fn is_ready_for_more_media_data(&self) -> bool;

    /// Append one frame. Returns `false` if the sample was rejected.
    fn append(&mut self, frame: Frame) -> bool;

    /// No more samples will be appended.
    fn mark_input_finished(&mut self);

    /// Flush and close the container. `on_done` fires exactly once, possibly
    /// on another thread, when the file is complete (or the writer has
    /// given up on it).
    fn finish_writing(&mut self, on_done: Box<dyn FnOnce() + Send>);

    /// Description of the failure that moved the writer to `Failed`.
    fn error(&self) -> Option<String>;

    /// Path of the output container.
    fn output_path(&self) -> &Path;
}

/// Remove a leftover file at `path` so the muxer starts from nothing.
///
/// Failure is logged and ignored; if the path is truly unusable the writer
/// reports it when it opens the file.
pub fn remove_stale_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale output file"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove stale output file"
        ),
    }
}
