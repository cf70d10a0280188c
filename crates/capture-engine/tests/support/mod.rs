//! Scripted in-memory collaborators for driving `EncoderSession` without a
//! display or GStreamer.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use pidrec_capture_engine::{
    CaptureControl, CaptureStream, Frame, FrameSink, MediaWriter, StopCallback, WriterStatus,
};
use pidrec_common::error::{PidrecError, PidrecResult};
use pidrec_platform_core::{CaptureSource, ContentFilter, MonitorInfo, Rect, WindowInfo};

pub const WIDTH: u32 = 1280;
pub const HEIGHT: u32 = 720;
pub const FILE_HEADER: &str = "MOCKMP4\n";
pub const FILE_TRAILER: &str = "MOOV\n";

/// A fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pidrec_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn source() -> CaptureSource {
    let display = MonitorInfo {
        name: "eDP-1".to_string(),
        width: 1920,
        height: 1080,
        x: 0,
        y: 0,
        scale_factor: 1.0,
        refresh_rate_hz: 60,
        primary: true,
    };
    let window = WindowInfo {
        id: 0x0280_0003,
        pid: 4242,
        title: "Demo".to_string(),
        frame: Rect::new(100, 80, WIDTH, HEIGHT),
        on_screen: true,
    };
    CaptureSource::new(
        display,
        ContentFilter::SingleWindow { window },
        WIDTH,
        HEIGHT,
        CaptureSource::interval_for_fps(60),
        4,
    )
    .unwrap()
}

pub fn pts(index: u64) -> Duration {
    Duration::from_micros(1_000_000 + index * 16_667)
}

/// A well-formed frame at `pts(index)`.
pub fn frame(index: u64) -> Frame {
    Frame::new(pts(index), vec![0u8; 16]).with_content_rect(Rect::new(0, 0, WIDTH, HEIGHT))
}

/// A frame without a content rectangle.
pub fn malformed_frame(index: u64) -> Frame {
    Frame::new(pts(index), vec![0u8; 16])
}

/// What the mock writer saw, shared with the test.
#[derive(Debug, Default)]
pub struct WriterLog {
    pub origin: Option<Duration>,
    pub appended: Vec<Duration>,
    pub input_finished: bool,
    pub finish_requested: bool,
}

/// File-backed writer with scripted readiness and failure.
///
/// Each accepted frame is written as one line, so the output file shows
/// exactly which frames made it.
pub struct MockWriter {
    path: PathBuf,
    status: WriterStatus,
    error: Option<String>,
    not_ready: Vec<u64>,
    fail_on_append: Option<u64>,
    readiness_checks: Cell<u64>,
    appends: u64,
    log: Arc<Mutex<WriterLog>>,
}

impl MockWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            status: WriterStatus::Unstarted,
            error: None,
            not_ready: Vec::new(),
            fail_on_append: None,
            readiness_checks: Cell::new(0),
            appends: 0,
            log: Arc::new(Mutex::new(WriterLog::default())),
        }
    }

    /// Report "not ready" on these 1-based readiness checks.
    pub fn not_ready_on(mut self, checks: &[u64]) -> Self {
        self.not_ready = checks.to_vec();
        self
    }

    /// Fail on the given 1-based append and stay failed.
    pub fn fail_on_append(mut self, append: u64) -> Self {
        self.fail_on_append = Some(append);
        self
    }

    pub fn log(&self) -> Arc<Mutex<WriterLog>> {
        self.log.clone()
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl MediaWriter for MockWriter {
    fn status(&self) -> WriterStatus {
        self.status
    }

    fn start_writing(&mut self) -> PidrecResult<()> {
        // Refuses to write into an existing file, like a real muxer.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        file.write_all(FILE_HEADER.as_bytes())?;
        self.status = WriterStatus::Writing;
        Ok(())
    }

    fn start_session(&mut self, origin: Duration) {
        self.log.lock().unwrap().origin = Some(origin);
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        let check = self.readiness_checks.get() + 1;
        self.readiness_checks.set(check);
        !self.not_ready.contains(&check)
    }

    fn append(&mut self, frame: Frame) -> bool {
        self.appends += 1;
        if self.fail_on_append == Some(self.appends) {
            self.status = WriterStatus::Failed;
            self.error = Some("simulated encoder failure".to_string());
            return false;
        }
        if self.log.lock().unwrap().origin.is_none() {
            return false;
        }
        if self
            .write_line(&format!("frame {}\n", frame.pts.as_micros()))
            .is_err()
        {
            return false;
        }
        self.log.lock().unwrap().appended.push(frame.pts);
        true
    }

    fn mark_input_finished(&mut self) {
        self.log.lock().unwrap().input_finished = true;
    }

    fn finish_writing(&mut self, on_done: Box<dyn FnOnce() + Send>) {
        self.log.lock().unwrap().finish_requested = true;
        if self.status == WriterStatus::Writing {
            match self.write_line(FILE_TRAILER) {
                Ok(()) => self.status = WriterStatus::Finalized,
                Err(e) => {
                    self.status = WriterStatus::Failed;
                    self.error = Some(e.to_string());
                }
            }
        }
        // Completion arrives from another thread, as with a real muxer.
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            on_done();
        });
    }

    fn error(&self) -> Option<String> {
        self.error.clone()
    }

    fn output_path(&self) -> &Path {
        &self.path
    }
}

struct ScriptedControl {
    cancelled: Arc<AtomicBool>,
}

impl CaptureControl for ScriptedControl {
    fn request_stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Capture stream that delivers a fixed list of frames from its own thread.
///
/// Delivery waits for queue space, so every frame reaches the intake
/// unless capture is cancelled through its control handle.
pub struct ScriptedCapture {
    frames: Vec<Frame>,
    refuse_output: bool,
    drop_stop_callback: bool,
    sink: Option<FrameSink>,
    cancelled: Arc<AtomicBool>,
    delivery: Option<JoinHandle<()>>,
}

impl ScriptedCapture {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            refuse_output: false,
            drop_stop_callback: false,
            sink: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            delivery: None,
        }
    }

    /// Fail sink registration, like a capture stream whose source vanished.
    pub fn refusing_output() -> Self {
        let mut capture = Self::new(Vec::new());
        capture.refuse_output = true;
        capture
    }

    /// Drop the stop callback instead of calling it.
    pub fn dropping_stop_callback(mut self) -> Self {
        self.drop_stop_callback = true;
        self
    }

    /// Set once the intake asks capture to stop.
    pub fn cancelled_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl CaptureStream for ScriptedCapture {
    fn add_output(&mut self, sink: FrameSink) -> PidrecResult<()> {
        if self.refuse_output {
            return Err(PidrecError::capture("Capture source is gone"));
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn start_capture(&mut self) -> PidrecResult<()> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| PidrecError::capture("No frame sink registered"))?;
        let frames = std::mem::take(&mut self.frames);
        let cancelled = self.cancelled.clone();
        self.delivery = Some(std::thread::spawn(move || {
            for frame in frames {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                if sink.send(frame).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop_capture(&mut self, on_done: StopCallback) {
        if let Some(delivery) = self.delivery.take() {
            let _ = delivery.join();
        }
        if self.drop_stop_callback {
            drop(on_done);
        } else {
            on_done(Ok(()));
        }
    }

    fn control(&self) -> Arc<dyn CaptureControl> {
        Arc::new(ScriptedControl {
            cancelled: self.cancelled.clone(),
        })
    }
}

/// Lines of the mock output file that record appended frames.
pub fn frame_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| line.starts_with("frame "))
        .map(str::to_string)
        .collect()
}
