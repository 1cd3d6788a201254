#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex, Weak,
};

use camera_core::{
    buffer::Surface,
    error::ServiceErrorCode,
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    stream::{CaptureId, OperationMode, PixelFormat, RepeatStreamType, StreamId, StreamInfo},
    unknown_error, Result,
};
use camera_device::{CameraDevice, CaptureInfo, DeviceErrorKind, DeviceInformation, StreamError, StreamOperator, StreamOperatorCallback};
use camera_session::{
    stream::{StreamCapture, StreamCaptureCallback, StreamMetadataCallback, StreamRepeat, StreamRepeatCallback},
    CaptureSession, CaptureSessionCallback, SessionConfig, Stream,
};

static NEXT_PID: AtomicU32 = AtomicU32::new(40_000);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A pid no other test in this binary uses.
pub fn unique_pid() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Default)]
pub struct MockOperator {
    pub captures: Mutex<Vec<(CaptureId, CaptureInfo, bool)>>,
    pub cancels: Mutex<Vec<CaptureId>>,
    pub fail_capture: AtomicBool,
}

impl MockOperator {
    pub fn capture_count(&self) -> usize {
        self.captures.lock().unwrap().len()
    }

    pub fn last_capture(&self) -> Option<(CaptureId, CaptureInfo, bool)> {
        self.captures.lock().unwrap().last().cloned()
    }
}

impl StreamOperator for MockOperator {
    fn create_streams(&self, _infos: &[StreamInfo]) -> Result<()> {
        Ok(())
    }

    fn commit_streams(&self, _op_mode: OperationMode, _settings: &CameraMetadata) -> Result<()> {
        Ok(())
    }

    fn capture(&self, capture_id: CaptureId, info: &CaptureInfo, is_streaming: bool) -> Result<()> {
        if self.fail_capture.load(Ordering::Acquire) {
            return Err(unknown_error!("capture rejected"));
        }
        self.captures.lock().unwrap().push((capture_id, info.clone(), is_streaming));
        Ok(())
    }

    fn cancel_capture(&self, capture_id: CaptureId) -> Result<()> {
        self.cancels.lock().unwrap().push(capture_id);
        Ok(())
    }

    fn release_streams(&self, _stream_ids: &[StreamId]) -> Result<()> {
        Ok(())
    }
}

pub struct MockDevice {
    info: DeviceInformation,
    pub operator: Arc<MockOperator>,
    pub ability: Mutex<Option<Arc<CameraMetadata>>>,
    pub status: Mutex<Option<CameraMetadata>>,
    pub callback: Mutex<Option<Weak<dyn StreamOperatorCallback>>>,
    pub committed_infos: Mutex<Vec<Vec<StreamInfo>>>,
    pub released_ids: Mutex<Vec<Vec<StreamId>>>,
    pub updated_infos: Mutex<Vec<Vec<StreamInfo>>>,
    pub settings_once: Mutex<Vec<CameraMetadata>>,
    pub errors: Mutex<Vec<DeviceErrorKind>>,
    pub next_hdi_id: AtomicI32,
    pub reset_hdi_count: AtomicUsize,
    pub release_count: AtomicUsize,
    pub secure_seq: AtomicU64,
    pub fail_commit: AtomicBool,
    pub moving_photo_supported: AtomicBool,
    pub muted: AtomicBool,
}

pub fn default_ability() -> CameraMetadata {
    let mut ability = CameraMetadata::new();
    ability.add_entry(MetadataTag::AbilityCameraModes, MetadataValue::Byte(vec![0, 1, 2]));
    ability.add_entry(MetadataTag::SensorOrientation, MetadataValue::Int32(vec![90]));
    ability
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            info: DeviceInformation {
                id: "device/0".to_string(),
                name: "back camera".to_string(),
            },
            operator: Arc::new(MockOperator::default()),
            ability: Mutex::new(Some(Arc::new(default_ability()))),
            status: Mutex::new(None),
            callback: Mutex::new(None),
            committed_infos: Mutex::new(Vec::new()),
            released_ids: Mutex::new(Vec::new()),
            updated_infos: Mutex::new(Vec::new()),
            settings_once: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            next_hdi_id: AtomicI32::new(1),
            reset_hdi_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
            secure_seq: AtomicU64::new(0),
            fail_commit: AtomicBool::new(false),
            moving_photo_supported: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        })
    }

    pub fn stream_operator_callback(&self) -> Option<Arc<dyn StreamOperatorCallback>> {
        self.callback.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub fn has_callback(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

impl CameraDevice for MockDevice {
    fn info(&self) -> &DeviceInformation {
        &self.info
    }

    fn stream_operator(&self) -> Option<Arc<dyn StreamOperator>> {
        Some(self.operator.clone())
    }

    fn device_ability(&self) -> Option<Arc<CameraMetadata>> {
        self.ability.lock().unwrap().clone()
    }

    fn create_and_commit_streams(&self, infos: &[StreamInfo], _ability: &CameraMetadata, _op_mode: OperationMode) -> Result<()> {
        if self.fail_commit.load(Ordering::Acquire) {
            return Err(unknown_error!("commit streams failed"));
        }
        self.committed_infos.lock().unwrap().push(infos.to_vec());
        Ok(())
    }

    fn release_streams(&self, stream_ids: &[StreamId]) -> Result<()> {
        self.released_ids.lock().unwrap().push(stream_ids.to_vec());
        Ok(())
    }

    fn update_streams(&self, infos: &[StreamInfo]) -> Result<()> {
        self.updated_infos.lock().unwrap().push(infos.to_vec());
        Ok(())
    }

    fn clone_cached_settings(&self) -> CameraMetadata {
        let mut settings = CameraMetadata::new();
        settings.add_entry(MetadataTag::ControlZoomRatio, MetadataValue::Float(vec![1.0]));
        settings
    }

    fn secure_camera_seq(&self) -> Result<u64> {
        Ok(self.secure_seq.load(Ordering::Acquire))
    }

    fn check_moving_photo_supported(&self, _op_mode: OperationMode) -> bool {
        self.moving_photo_supported.load(Ordering::Acquire)
    }

    fn set_stream_operator_callback(&self, callback: Option<Weak<dyn StreamOperatorCallback>>) {
        *self.callback.lock().unwrap() = callback;
    }

    fn dispatch_default_settings(&self) -> Result<()> {
        Ok(())
    }

    fn reset_device_settings(&self) -> Result<()> {
        Ok(())
    }

    fn generate_hdi_stream_id(&self) -> StreamId {
        self.next_hdi_id.fetch_add(1, Ordering::Relaxed)
    }

    fn reset_hdi_stream_id(&self) {
        self.reset_hdi_count.fetch_add(1, Ordering::Relaxed);
        self.next_hdi_id.store(1, Ordering::Relaxed);
    }

    fn update_setting_once(&self, settings: &CameraMetadata) -> Result<()> {
        self.settings_once.lock().unwrap().push(settings.clone());
        Ok(())
    }

    fn get_status(&self, _tags: &[MetadataTag]) -> Result<CameraMetadata> {
        self.status.lock().unwrap().clone().ok_or_else(|| unknown_error!("status is unavailable"))
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    fn on_error(&self, kind: DeviceErrorKind, _message: i32) {
        self.errors.lock().unwrap().push(kind);
    }

    fn release(&self) -> Result<()> {
        self.release_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Records every stream and session event as a short string.
#[derive(Default)]
pub struct EventRecorder {
    pub events: Mutex<Vec<String>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl StreamRepeatCallback for EventRecorder {
    fn on_frame_started(&self) {
        self.push("frame_started".to_string());
    }

    fn on_frame_ended(&self, frame_count: i32) {
        self.push(format!("frame_ended:{}", frame_count));
    }

    fn on_frame_error(&self, error: StreamError) {
        self.push(format!("frame_error:{:?}", error));
    }
}

impl StreamCaptureCallback for EventRecorder {
    fn on_capture_started(&self, capture_id: CaptureId) {
        self.push(format!("capture_started:{}", capture_id));
    }

    fn on_capture_ended(&self, capture_id: CaptureId, frame_count: i32) {
        self.push(format!("capture_ended:{}:{}", capture_id, frame_count));
    }

    fn on_capture_error(&self, capture_id: CaptureId, error: StreamError) {
        self.push(format!("capture_error:{}:{:?}", capture_id, error));
    }

    fn on_frame_shutter(&self, capture_id: CaptureId, timestamp: u64) {
        self.push(format!("shutter:{}:{}", capture_id, timestamp));
    }

    fn on_frame_shutter_end(&self, capture_id: CaptureId, timestamp: u64) {
        self.push(format!("shutter_end:{}:{}", capture_id, timestamp));
    }

    fn on_capture_ready(&self, capture_id: CaptureId, timestamp: u64) {
        self.push(format!("capture_ready:{}:{}", capture_id, timestamp));
    }
}

impl StreamMetadataCallback for EventRecorder {
    fn on_metadata_result(&self, stream_id: StreamId, result: &[u8]) {
        self.push(format!("metadata:{}:{:?}", stream_id, result));
    }
}

impl CaptureSessionCallback for EventRecorder {
    fn on_error(&self, code: ServiceErrorCode) {
        self.push(format!("session_error:{}", code));
    }
}

pub fn preview_stream() -> Arc<StreamRepeat> {
    let surface = Surface::new("preview", 64, 48, PixelFormat::YCBCR_420_SP);
    StreamRepeat::new(Some(surface), PixelFormat::YCBCR_420_SP, 64, 48, RepeatStreamType::Preview)
}

pub fn capture_stream() -> Arc<StreamCapture> {
    StreamCapture::new(PixelFormat::BLOB, 64, 48)
}

pub fn new_session(op_mode: OperationMode) -> Arc<CaptureSession> {
    CaptureSession::new(1, unique_pid(), op_mode, SessionConfig::default())
}

/// Configures `session` with `device` and `streams` and commits it.
pub fn commit_with(session: &CaptureSession, device: &Arc<MockDevice>, streams: &[Stream]) {
    session.begin_config().unwrap();
    session.add_input(device.clone()).unwrap();
    for stream in streams {
        session.add_output(stream.clone()).unwrap();
    }
    session.commit_config().unwrap();
}
