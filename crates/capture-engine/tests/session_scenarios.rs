mod support;

use std::sync::atomic::Ordering;

use pidrec_capture_engine::{EncoderSession, SessionState, WriterStatus};
use pidrec_common::error::PidrecError;

use support::{
    frame, frame_lines, malformed_frame, pts, scratch_dir, source, MockWriter, ScriptedCapture,
    FILE_HEADER, FILE_TRAILER,
};

fn frames(count: u64) -> Vec<pidrec_capture_engine::Frame> {
    (1..=count).map(frame).collect()
}

#[test]
fn ten_ready_frames_are_all_appended() {
    let dir = scratch_dir("ten_ready");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path);
    let log = writer.log();

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(writer),
        Box::new(ScriptedCapture::new(frames(10))),
    )
    .unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.output_path(), path.as_path());

    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(session.state(), SessionState::Finalized);
    assert_eq!(report.appended, 10);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.writer_status, WriterStatus::Finalized);
    assert_eq!(report.media_duration, Some(pts(10) - pts(1)));

    let log = log.lock().unwrap();
    assert_eq!(log.origin, Some(pts(1)));
    assert_eq!(log.appended, (1..=10).map(pts).collect::<Vec<_>>());
    assert!(log.input_finished);

    assert_eq!(frame_lines(&path).len(), 10);
    assert!(std::fs::read_to_string(&path).unwrap().ends_with(FILE_TRAILER));
}

#[test]
fn frames_are_dropped_while_the_encoder_is_busy() {
    let dir = scratch_dir("busy_encoder");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path).not_ready_on(&[3, 4, 5]);
    let log = writer.log();

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(writer),
        Box::new(ScriptedCapture::new(frames(10))),
    )
    .unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.appended, 7);
    assert_eq!(report.dropped, 3);
    assert_eq!(session.dropped_frame_count(), 3);
    assert!(report
        .summary_lines()
        .contains(&"dropped frames: 3".to_string()));

    let appended = log.lock().unwrap().appended.clone();
    assert_eq!(
        appended,
        [1, 2, 6, 7, 8, 9, 10].into_iter().map(pts).collect::<Vec<_>>()
    );
}

#[test]
fn malformed_first_frame_neither_counts_as_drop_nor_seeds_origin() {
    let dir = scratch_dir("malformed_first");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path);
    let log = writer.log();

    let delivered = vec![malformed_frame(1), frame(2), frame(3), frame(4)];
    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(writer),
        Box::new(ScriptedCapture::new(delivered)),
    )
    .unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.malformed, 1);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.appended, 3);
    assert_eq!(log.lock().unwrap().origin, Some(pts(2)));
    assert_eq!(report.media_duration, Some(pts(4) - pts(2)));
}

#[test]
fn busy_first_frame_still_seeds_origin() {
    let dir = scratch_dir("busy_first");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path).not_ready_on(&[1]);
    let log = writer.log();

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(writer),
        Box::new(ScriptedCapture::new(frames(3))),
    )
    .unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.dropped, 1);
    assert_eq!(report.appended, 2);
    let log = log.lock().unwrap();
    assert_eq!(log.origin, Some(pts(1)));
    assert_eq!(log.appended, vec![pts(2), pts(3)]);
    assert_eq!(report.media_duration, Some(pts(3) - pts(1)));
}

#[test]
fn stop_survives_a_stream_that_drops_its_completion() {
    let dir = scratch_dir("dropped_completion");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path);
    let log = writer.log();

    let capture = ScriptedCapture::new(frames(5)).dropping_stop_callback();
    let mut session =
        EncoderSession::with_parts(source(), Box::new(writer), Box::new(capture)).unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.appended, 5);
    assert_eq!(report.writer_status, WriterStatus::Finalized);
    assert!(log.lock().unwrap().finish_requested);
    assert!(std::fs::read_to_string(&path).unwrap().ends_with(FILE_TRAILER));
}

#[test]
fn invalid_frames_are_ignored() {
    let dir = scratch_dir("invalid_frames");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path);
    let log = writer.log();

    let delivered = vec![
        pidrec_capture_engine::Frame::invalid(pts(1)),
        frame(2),
        pidrec_capture_engine::Frame::invalid(pts(3)),
        frame(4),
    ];
    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(writer),
        Box::new(ScriptedCapture::new(delivered)),
    )
    .unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.invalid, 2);
    assert_eq!(report.appended, 2);
    assert_eq!(report.dropped, 0);
    assert_eq!(log.lock().unwrap().origin, Some(pts(2)));
}

#[test]
fn writer_failure_cancels_capture_and_keeps_written_frames() {
    let dir = scratch_dir("writer_failure");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path).fail_on_append(5);
    let log = writer.log();
    let capture = ScriptedCapture::new(frames(10));
    let cancelled = capture.cancelled_flag();

    let mut session =
        EncoderSession::with_parts(source(), Box::new(writer), Box::new(capture)).unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert!(cancelled.load(Ordering::SeqCst));
    assert_eq!(report.appended, 4);
    assert_eq!(report.append_failures, 1);
    assert!(report.rejected >= 1);
    assert_eq!(report.writer_status, WriterStatus::Failed);
    assert_eq!(report.writer_error.as_deref(), Some("simulated encoder failure"));
    assert!(log.lock().unwrap().finish_requested);

    let lines = frame_lines(&path);
    assert_eq!(
        lines,
        (1..=4)
            .map(|i| format!("frame {}", pts(i).as_micros()))
            .collect::<Vec<_>>()
    );
}

#[test]
fn immediate_stop_still_produces_a_finalized_file() {
    let dir = scratch_dir("immediate_stop");
    let path = dir.join("out.mp4");

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(MockWriter::new(&path)),
        Box::new(ScriptedCapture::new(Vec::new())),
    )
    .unwrap();
    session.start().unwrap();
    let report = session.stop().unwrap();

    assert_eq!(report.appended, 0);
    assert_eq!(report.media_duration, None);
    assert!(report.is_complete());
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, format!("{FILE_HEADER}{FILE_TRAILER}"));
}

#[test]
fn capture_registration_failure_is_not_fatal() {
    let dir = scratch_dir("registration_failure");
    let path = dir.join("out.mp4");

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(MockWriter::new(&path)),
        Box::new(ScriptedCapture::refusing_output()),
    )
    .unwrap();
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Capturing);

    let report = session.stop().unwrap();
    assert_eq!(report.appended, 0);
    assert!(report.is_complete());
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn stale_output_is_replaced_not_appended_to() {
    let dir = scratch_dir("stale_output");
    let path = dir.join("out.mp4");
    std::fs::write(&path, "stale partial recording\n").unwrap();

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(MockWriter::new(&path)),
        Box::new(ScriptedCapture::new(frames(2))),
    )
    .unwrap();
    session.start().unwrap();
    session.stop().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with(FILE_HEADER));
    assert!(!content.contains("stale"));
    assert_eq!(frame_lines(&path).len(), 2);
}

#[test]
fn lifecycle_misuse_is_reported() {
    let dir = scratch_dir("lifecycle_misuse");
    let path = dir.join("out.mp4");

    let mut session = EncoderSession::with_parts(
        source(),
        Box::new(MockWriter::new(&path)),
        Box::new(ScriptedCapture::new(frames(1))),
    )
    .unwrap();

    assert!(matches!(
        session.stop(),
        Err(PidrecError::InvalidState { .. })
    ));

    session.start().unwrap();
    assert!(matches!(
        session.start(),
        Err(PidrecError::InvalidState { .. })
    ));

    session.stop().unwrap();
    assert!(matches!(
        session.stop(),
        Err(PidrecError::InvalidState { .. })
    ));
    assert!(matches!(
        session.start(),
        Err(PidrecError::InvalidState { .. })
    ));
}

#[test]
fn dropping_a_capturing_session_finalizes_the_output() {
    let dir = scratch_dir("drop_while_capturing");
    let path = dir.join("out.mp4");
    let writer = MockWriter::new(&path);
    let log = writer.log();

    {
        let mut session = EncoderSession::with_parts(
            source(),
            Box::new(writer),
            Box::new(ScriptedCapture::new(frames(3))),
        )
        .unwrap();
        session.start().unwrap();
    }

    let log = log.lock().unwrap();
    assert!(log.finish_requested);
    assert_eq!(log.appended.len(), 3);
    assert!(std::fs::read_to_string(&path).unwrap().ends_with(FILE_TRAILER));
}
