mod common;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use camera_core::{
    buffer::{Surface, SurfaceListener},
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    stream::{OperationMode, PixelFormat, RepeatStreamType, StreamType},
    Result,
};
use camera_device::StreamOperatorCallback;
use camera_session::{
    moving_photo::{DrainImageCallback, FrameRecord, FrameStatus, MovingPhotoEncoder, MovingPhotoListener, MovingPhotoVideoCache, SessionDrainImageCallback, TaskManager},
    CaptureSession, SessionConfig,
};
use common::*;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingEncoder {
    encoded: AtomicUsize,
    clips: Mutex<Vec<(Vec<i64>, u64, i32)>>,
    audio: AtomicBool,
}

impl MovingPhotoEncoder for RecordingEncoder {
    fn encode_frame(&self, frame: &FrameRecord) -> bool {
        self.encoded.fetch_add(1, Ordering::Relaxed);
        frame.set_encoded_buffer(vec![0; 4]);
        true
    }

    fn mux_video(&self, frames: &[Arc<FrameRecord>], timestamp: u64, rotation: i32) -> Result<()> {
        self.clips.lock().unwrap().push((frames.iter().map(|frame| frame.timestamp()).collect(), timestamp, rotation));
        Ok(())
    }

    fn start_audio_capture(&self) -> bool {
        self.audio.store(true, Ordering::Release);
        true
    }

    fn stop_audio_capture(&self) {
        self.audio.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct DrainRecorder {
    frames: Mutex<Vec<(i64, bool)>>,
    finished: Mutex<Vec<bool>>,
}

impl DrainImageCallback for DrainRecorder {
    fn on_drain_image(&self, frame: Arc<FrameRecord>) {
        self.frames.lock().unwrap().push((frame.timestamp(), frame.is_cover_frame()));
    }

    fn on_drain_image_finish(&self, finished: bool) {
        self.finished.lock().unwrap().push(finished);
    }
}

/// Blocks the encode of one frame while the test holds `gate`.
struct GatedEncoder {
    gated_timestamp: i64,
    gate: Mutex<()>,
    started: Mutex<Vec<i64>>,
    inner: RecordingEncoder,
}

impl GatedEncoder {
    fn new(gated_timestamp: i64) -> Self {
        Self {
            gated_timestamp,
            gate: Mutex::new(()),
            started: Mutex::new(Vec::new()),
            inner: RecordingEncoder::default(),
        }
    }

    fn started(&self) -> Vec<i64> {
        self.started.lock().unwrap().clone()
    }

    fn clips(&self) -> Vec<(Vec<i64>, u64, i32)> {
        self.inner.clips.lock().unwrap().clone()
    }
}

impl MovingPhotoEncoder for GatedEncoder {
    fn encode_frame(&self, frame: &FrameRecord) -> bool {
        self.started.lock().unwrap().push(frame.timestamp());
        if frame.timestamp() == self.gated_timestamp {
            let _open = self.gate.lock().unwrap();
        }
        self.inner.encode_frame(frame)
    }

    fn mux_video(&self, frames: &[Arc<FrameRecord>], timestamp: u64, rotation: i32) -> Result<()> {
        self.inner.mux_video(frames, timestamp, rotation)
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + IDLE_TIMEOUT;
    while !condition() {
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

fn listener_with_capacity(capacity: usize) -> (Arc<Surface>, Arc<MovingPhotoListener>) {
    let surface = Surface::new("moving-photo", 4, 4, PixelFormat::YCBCR_420_SP);
    let listener = MovingPhotoListener::new(surface.clone(), capacity);
    surface.set_listener(Arc::downgrade(&(listener.clone() as Arc<dyn SurfaceListener>)));
    (surface, listener)
}

fn flush_frames(surface: &Surface, timestamps: &[i64]) {
    for timestamp in timestamps {
        let buffer = surface.request_buffer();
        surface.flush_buffer(buffer, *timestamp).unwrap();
    }
}

#[test]
fn test_cache_is_bounded() {
    init_logger();
    let (surface, listener) = listener_with_capacity(3);
    flush_frames(&surface, &[1, 2, 3, 4]);

    assert_eq!(listener.cached_frame_count(), 3);
    assert_eq!(surface.released_count(), 1);
    let timestamps: Vec<_> = listener.cached_frames().iter().map(|frame| frame.timestamp()).collect();
    assert_eq!(timestamps, vec![2, 3, 4]);

    listener.clear_cache();
    assert_eq!(listener.cached_frame_count(), 0);
    assert_eq!(surface.released_count(), 4);
    assert_eq!(surface.in_flight(), 0);
}

#[test]
fn test_zero_capacity_keeps_one_frame() {
    let (surface, listener) = listener_with_capacity(0);
    flush_frames(&surface, &[1, 2]);
    assert_eq!(listener.capacity(), 1);
    assert_eq!(listener.cached_frame_count(), 1);
}

#[test]
fn test_drain_out_image() {
    let (surface, listener) = listener_with_capacity(3);
    flush_frames(&surface, &[10, 20]);

    let recorder = Arc::new(DrainRecorder::default());
    listener.drain_out_image(recorder.clone());
    assert_eq!(listener.drain_count(), 1);
    assert_eq!(recorder.frames.lock().unwrap().clone(), vec![(10, false), (20, true)]);

    // two cached frames plus a full cache of new ones
    flush_frames(&surface, &[30, 40]);
    assert!(recorder.finished.lock().unwrap().is_empty());
    flush_frames(&surface, &[50]);
    assert_eq!(recorder.finished.lock().unwrap().clone(), vec![true]);
    assert_eq!(listener.drain_count(), 0);

    flush_frames(&surface, &[60]);
    assert_eq!(recorder.frames.lock().unwrap().len(), 5);
}

#[test]
fn test_stop_drain_out() {
    let (surface, listener) = listener_with_capacity(4);
    flush_frames(&surface, &[1]);
    let first = Arc::new(DrainRecorder::default());
    let second = Arc::new(DrainRecorder::default());
    listener.drain_out_image(first.clone());
    listener.drain_out_image(second.clone());
    assert_eq!(listener.drain_count(), 2);

    listener.stop_drain_out();
    listener.stop_drain_out();
    assert_eq!(first.finished.lock().unwrap().clone(), vec![false]);
    assert_eq!(second.finished.lock().unwrap().clone(), vec![false]);
    assert_eq!(listener.drain_count(), 0);
}

#[test]
fn test_clip_pipeline() {
    init_logger();
    let encoder = Arc::new(RecordingEncoder::default());
    let task_manager = TaskManager::new(encoder.clone()).unwrap();
    let video_cache = MovingPhotoVideoCache::new(task_manager.clone());
    let (surface, listener) = listener_with_capacity(2);
    flush_frames(&surface, &[40, 10]);

    let callback = SessionDrainImageCallback::new(Arc::downgrade(&listener), video_cache.clone(), 1000, 90);
    listener.drain_out_image(callback.clone());
    assert_eq!(callback.frame_count(), 2);
    flush_frames(&surface, &[30, 20]);
    assert_eq!(callback.frame_count(), 0);

    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(encoder.encoded.load(Ordering::Relaxed), 4);
    assert_eq!(task_manager.muxed_count(), 1);
    assert_eq!(encoder.clips.lock().unwrap().clone(), vec![(vec![10, 20, 30, 40], 1000, 90)]);
    assert_eq!(video_cache.pending_handle_count(), 0);
}

#[test]
fn test_incomplete_drain_still_muxes() {
    let encoder = Arc::new(RecordingEncoder::default());
    let task_manager = TaskManager::new(encoder.clone()).unwrap();
    let video_cache = MovingPhotoVideoCache::new(task_manager.clone());
    let (surface, listener) = listener_with_capacity(3);
    flush_frames(&surface, &[1, 2]);

    let callback = SessionDrainImageCallback::new(Arc::downgrade(&listener), video_cache, 7, 0);
    listener.drain_out_image(callback);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    listener.stop_drain_out();
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(encoder.clips.lock().unwrap().clone(), vec![(vec![1, 2], 7, 0)]);
}

#[test]
fn test_stop_drops_queued_tasks() {
    let task_manager = TaskManager::new(Arc::new(RecordingEncoder::default())).unwrap();
    let gate = Arc::new(Mutex::new(()));
    let ran = Arc::new(AtomicUsize::new(0));

    let guard = gate.lock().unwrap();
    let blocker = gate.clone();
    assert!(task_manager.submit(move || {
        let _unused = blocker.lock().unwrap();
    }));
    for _ in 0..3 {
        let ran = ran.clone();
        assert!(task_manager.submit(move || {
            ran.fetch_add(1, Ordering::Relaxed);
        }));
    }
    task_manager.stop();
    drop(guard);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(ran.load(Ordering::Relaxed), 0);
    assert_eq!(task_manager.pending_tasks(), 0);

    let ran_after = ran.clone();
    task_manager.submit(move || {
        ran_after.fetch_add(1, Ordering::Relaxed);
    });
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(ran.load(Ordering::Relaxed), 1);
}

#[test]
fn test_stop_reports_dropped_encodes() {
    let task_manager = TaskManager::new(Arc::new(RecordingEncoder::default())).unwrap();
    let (surface, listener) = listener_with_capacity(1);
    flush_frames(&surface, &[5]);
    let frame = listener.cached_frames().remove(0);
    frame.set_status(FrameStatus::Encoding);

    let gate = Arc::new(Mutex::new(()));
    let guard = gate.lock().unwrap();
    let blocker = gate.clone();
    assert!(task_manager.submit(move || {
        let _unused = blocker.lock().unwrap();
    }));
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    assert!(task_manager.encode_video_buffer(frame.clone(), move |frame, encoded| {
        sink.lock().unwrap().push((frame.timestamp(), encoded));
    }));
    task_manager.stop();
    drop(guard);

    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(results.lock().unwrap().clone(), vec![(5, false)]);
    assert_eq!(frame.status(), FrameStatus::Idle);
}

fn moving_photo_session(encoder: Arc<dyn MovingPhotoEncoder>) -> (Arc<CaptureSession>, Arc<MockDevice>) {
    init_logger();
    let config = SessionConfig {
        cache_frame_count: 2,
        ..SessionConfig::default()
    };
    let session = CaptureSession::new(1, unique_pid(), OperationMode::Capture, config);
    session.set_moving_photo_encoder(encoder);
    let device = MockDevice::new();
    device.moving_photo_supported.store(true, Ordering::Release);
    (session, device)
}

fn live_photo_count(session: &CaptureSession) -> usize {
    session
        .streams()
        .get_streams(StreamType::Repeat)
        .iter()
        .filter(|stream| stream.as_repeat().map(|repeat| repeat.repeat_type()) == Some(RepeatStreamType::LivePhoto))
        .count()
}

#[test]
fn test_commit_adds_live_photo_stream() {
    let (session, device) = moving_photo_session(Arc::new(RecordingEncoder::default()));
    commit_with(&session, &device, &[preview_stream().into()]);
    assert_eq!(live_photo_count(&session), 1);
    assert_eq!(device.committed_infos.lock().unwrap()[0].len(), 2);
    assert_eq!(session.moving_photo_listener().unwrap().capacity(), 2);
    assert!(session.moving_photo_task_manager().is_some());

    session.begin_config().unwrap();
    assert_eq!(live_photo_count(&session), 0);
    assert!(session.moving_photo_listener().is_none());
    session.commit_config().unwrap();
    assert_eq!(live_photo_count(&session), 1);
}

#[test]
fn test_enable_moving_photo() {
    let encoder = Arc::new(RecordingEncoder::default());
    let (session, device) = moving_photo_session(encoder.clone());
    commit_with(&session, &device, &[preview_stream().into()]);

    // deferred until start
    session.enable_moving_photo(true).unwrap();
    assert_eq!(device.operator.capture_count(), 0);
    session.start().unwrap();
    assert_eq!(device.operator.capture_count(), 2);
    assert!(encoder.audio.load(Ordering::Acquire));

    session.enable_moving_photo(false).unwrap();
    assert_eq!(device.operator.cancels.lock().unwrap().len(), 1);
    assert!(!encoder.audio.load(Ordering::Acquire));

    session.enable_moving_photo(true).unwrap();
    assert_eq!(device.operator.capture_count(), 3);
}

#[test]
fn test_shutter_records_clip() {
    let encoder = Arc::new(RecordingEncoder::default());
    let (session, device) = moving_photo_session(encoder.clone());
    let capture = capture_stream();
    commit_with(&session, &device, &[preview_stream().into(), capture.clone().into()]);
    session.enable_moving_photo(true).unwrap();
    session.start().unwrap();

    let listener = session.moving_photo_listener().unwrap();
    let task_manager = session.moving_photo_task_manager().unwrap();
    flush_frames(listener.surface(), &[100, 200]);

    let mut settings = CameraMetadata::new();
    settings.add_entry(MetadataTag::JpegOrientation, MetadataValue::Int32(vec![90]));
    let capture_id = capture.capture(&settings).unwrap();
    session.on_frame_shutter(capture_id, &[capture.common().hdi_stream_id()], 200).unwrap();
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(listener.drain_count(), 1);

    flush_frames(listener.surface(), &[300, 400]);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    // sensor orientation 90 plus capture rotation 90
    assert_eq!(encoder.clips.lock().unwrap().clone(), vec![(vec![100, 200, 300, 400], 200, 180)]);
    assert_eq!(listener.drain_count(), 0);
}

#[test]
fn test_stop_finishes_drains() {
    let (session, device) = moving_photo_session(Arc::new(RecordingEncoder::default()));
    let capture = capture_stream();
    commit_with(&session, &device, &[preview_stream().into(), capture.clone().into()]);
    session.enable_moving_photo(true).unwrap();
    session.start().unwrap();

    let listener = session.moving_photo_listener().unwrap();
    let task_manager = session.moving_photo_task_manager().unwrap();
    let capture_id = capture.capture(&CameraMetadata::new()).unwrap();
    session.on_frame_shutter(capture_id, &[capture.common().hdi_stream_id()], 1).unwrap();
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(listener.drain_count(), 1);

    session.stop().unwrap();
    assert_eq!(listener.drain_count(), 0);
}

#[test]
fn test_mirror_change_restarts_live_photo() {
    let (session, device) = moving_photo_session(Arc::new(RecordingEncoder::default()));
    commit_with(&session, &device, &[preview_stream().into()]);
    session.enable_moving_photo(true).unwrap();
    session.start().unwrap();
    let listener = session.moving_photo_listener().unwrap();
    flush_frames(listener.surface(), &[1, 2]);

    session.start_moving_photo_capture(true).unwrap();
    assert!(session.is_moving_photo_mirror());
    assert_eq!(listener.cached_frame_count(), 0);
    let (_, info, _) = device.operator.last_capture().unwrap();
    assert_eq!(info.settings.find_u8(MetadataTag::ControlMirror), Some(1));

    // same setting, no restart
    let captures = device.operator.capture_count();
    session.start_moving_photo_capture(true).unwrap();
    assert_eq!(device.operator.capture_count(), captures);
}

#[test]
fn test_stop_muxes_encoded_part_of_clip() {
    let encoder = Arc::new(GatedEncoder::new(200));
    let (session, device) = moving_photo_session(encoder.clone());
    let capture = capture_stream();
    commit_with(&session, &device, &[preview_stream().into(), capture.clone().into()]);
    session.enable_moving_photo(true).unwrap();
    session.start().unwrap();

    let listener = session.moving_photo_listener().unwrap();
    let task_manager = session.moving_photo_task_manager().unwrap();
    flush_frames(listener.surface(), &[100, 200]);

    let gate = encoder.gate.lock().unwrap();
    session.on_frame_shutter(1, &[capture.common().hdi_stream_id()], 200).unwrap();
    assert!(wait_until(|| encoder.started() == vec![100, 200]));

    // frame 200 is still encoding, the clip keeps frame 100
    session.stop().unwrap();
    assert_eq!(encoder.clips(), vec![(vec![100], 200, 90)]);

    drop(gate);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    assert_eq!(encoder.clips().len(), 1);
}

#[test]
fn test_restart_after_stop_with_queued_encode() {
    let encoder = Arc::new(GatedEncoder::new(100));
    let (session, device) = moving_photo_session(encoder.clone());
    let capture = capture_stream();
    commit_with(&session, &device, &[preview_stream().into(), capture.clone().into()]);
    session.enable_moving_photo(true).unwrap();
    session.start().unwrap();

    let listener = session.moving_photo_listener().unwrap();
    let task_manager = session.moving_photo_task_manager().unwrap();
    flush_frames(listener.surface(), &[100, 200]);

    let gate = encoder.gate.lock().unwrap();
    session.on_frame_shutter(1, &[capture.common().hdi_stream_id()], 200).unwrap();
    assert!(wait_until(|| encoder.started() == vec![100]));
    session.stop().unwrap();
    drop(gate);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));

    // the queued encode of frame 200 was dropped and the frame is reusable
    assert_eq!(encoder.started(), vec![100]);
    let statuses: Vec<_> = listener.cached_frames().iter().map(|frame| (frame.timestamp(), frame.status())).collect();
    assert_eq!(statuses, vec![(100, FrameStatus::FinishCache), (200, FrameStatus::Idle)]);

    session.start().unwrap();
    session.on_frame_shutter(2, &[capture.common().hdi_stream_id()], 400).unwrap();
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));
    flush_frames(listener.surface(), &[300, 400]);
    assert!(task_manager.wait_idle(IDLE_TIMEOUT));

    assert_eq!(encoder.clips(), vec![(vec![], 200, 90), (vec![100, 200, 300, 400], 400, 90)]);
    assert_eq!(listener.drain_count(), 0);
}
