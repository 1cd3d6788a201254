use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
};

use camera_core::{
    invalid_state_error,
    metadata::{CameraMetadata, MetadataTag},
    not_allowed_error,
    stream::{CaptureId, OperationMode, PixelFormat, StreamId, StreamInfo, StreamIntent, StreamType, CAPTURE_ID_UNSET},
    Result,
};
use camera_device::{CaptureInfo, StreamError};
use log::{debug, error, info};
use smallvec::smallvec;
use uuid::Uuid;

use super::{generate_fwk_stream_id, StreamCommon};

pub trait StreamCaptureCallback: Send + Sync {
    fn on_capture_started(&self, capture_id: CaptureId);
    fn on_capture_ended(&self, capture_id: CaptureId, frame_count: i32);
    fn on_capture_error(&self, capture_id: CaptureId, error: StreamError);
    fn on_frame_shutter(&self, capture_id: CaptureId, timestamp: u64);
    fn on_frame_shutter_end(&self, capture_id: CaptureId, timestamp: u64);
    fn on_capture_ready(&self, capture_id: CaptureId, timestamp: u64);
}

#[derive(Default)]
struct BurstState {
    is_bursting: bool,
    // shutter-end events seen since the burst started
    burst_num: u32,
    burst_seq: u32,
    keys: HashMap<CaptureId, String>,
    images: HashMap<CaptureId, Vec<String>>,
    expected: HashMap<CaptureId, u32>,
}

impl BurstState {
    fn retire_if_complete(&mut self, capture_id: CaptureId) -> bool {
        let recorded = self.images.get(&capture_id).map(Vec::len).unwrap_or(0);
        match self.expected.get(&capture_id) {
            Some(expected) if *expected as usize == recorded => {
                info!("burst of capture {} complete with {} images", capture_id, recorded);
                self.keys.remove(&capture_id);
                self.images.remove(&capture_id);
                self.expected.remove(&capture_id);
                true
            }
            _ => false,
        }
    }
}

/// A one-shot or burst still-image stream.
pub struct StreamCapture {
    common: StreamCommon,
    mode: RwLock<OperationMode>,
    callback: RwLock<Option<Arc<dyn StreamCaptureCallback>>>,
    rotations: Mutex<HashMap<CaptureId, i32>>,
    burst: Mutex<BurstState>,
    capture_ready: AtomicBool,
}

impl StreamCapture {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Arc<Self> {
        Self::with_stream_id(generate_fwk_stream_id(), format, width, height)
    }

    pub fn with_stream_id(fwk_stream_id: StreamId, format: PixelFormat, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            common: StreamCommon::new(StreamType::Capture, fwk_stream_id, format, width, height),
            mode: RwLock::new(OperationMode::Normal),
            callback: RwLock::new(None),
            rotations: Mutex::new(HashMap::new()),
            burst: Mutex::new(BurstState::default()),
            capture_ready: AtomicBool::new(true),
        })
    }

    pub fn common(&self) -> &StreamCommon {
        &self.common
    }

    pub fn set_mode(&self, mode: OperationMode) {
        *self.mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn mode(&self) -> OperationMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_callback(&self, callback: Arc<dyn StreamCaptureCallback>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn callback(&self) -> Option<Arc<dyn StreamCaptureCallback>> {
        self.callback.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn burst_state(&self) -> MutexGuard<'_, BurstState> {
        self.burst.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rotation_map(&self) -> MutexGuard<'_, HashMap<CaptureId, i32>> {
        self.rotations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_capture_ready(&self) -> bool {
        self.capture_ready.load(Ordering::Acquire)
    }

    /// Issues a still capture. A `ControlBurstCapture` value of 1 in
    /// `settings` turns the request into a burst.
    pub fn capture(&self, settings: &CameraMetadata) -> Result<CaptureId> {
        let operator = self.common.stream_operator()?;
        if self.common.prepared_capture_id() != CAPTURE_ID_UNSET {
            return Err(invalid_state_error!("a capture is already in progress"));
        }
        if !self.is_capture_ready() {
            return Err(not_allowed_error!("stream is not ready for capture"));
        }

        let capture_id = self.common.prepare_capture_id();
        let rotation = settings.find_i32(MetadataTag::JpegOrientation).unwrap_or(0);
        self.rotation_map().insert(capture_id, rotation);

        let is_bursting = settings.find_u8(MetadataTag::ControlBurstCapture) == Some(1);
        if is_bursting {
            if let Err(err) = self.prepare_burst(capture_id) {
                self.rotation_map().remove(&capture_id);
                self.common.reset_capture_id();
                return Err(err);
            }
        }

        let info = CaptureInfo {
            stream_ids: smallvec![self.common.hdi_stream_id()],
            settings: settings.clone(),
            enable_shutter_callback: true,
        };
        if let Err(err) = operator.capture(capture_id, &info, is_bursting) {
            error!("capture failed: stream {}, {}", self.common.fwk_stream_id(), err);
            self.rotation_map().remove(&capture_id);
            if is_bursting {
                self.reset_burst();
                self.reset_burst_key(capture_id);
            }
            self.common.reset_capture_id();
            return Err(err);
        }

        // Single captures complete asynchronously, a burst keeps its request
        // alive until it is confirmed or cancelled.
        if !is_bursting {
            self.capture_ready.store(false, Ordering::Release);
            self.common.reset_capture_id();
        }
        Ok(capture_id)
    }

    pub fn cancel_capture(&self) -> Result<()> {
        let capture_id = self.common.prepared_capture_id();
        if capture_id == CAPTURE_ID_UNSET {
            return Ok(());
        }
        let operator = self.common.stream_operator()?;
        self.common.reset_capture_id();
        self.reset_burst();
        operator.cancel_capture(capture_id)
    }

    /// Ends the running burst. The key stays until every image is recorded.
    pub fn confirm_capture(&self) -> Result<()> {
        if !self.burst_state().is_bursting {
            return Err(not_allowed_error!("no burst capture in progress"));
        }
        let capture_id = self.common.prepared_capture_id();
        let operator = self.common.stream_operator()?;
        {
            let mut burst = self.burst_state();
            let burst_num = burst.burst_num;
            burst.expected.insert(capture_id, burst_num);
            burst.is_bursting = false;
            burst.burst_num = 0;
            burst.retire_if_complete(capture_id);
        }
        self.common.reset_capture_id();
        operator.cancel_capture(capture_id)
    }

    pub fn prepare_burst(&self, capture_id: CaptureId) -> Result<()> {
        let mut burst = self.burst_state();
        if burst.is_bursting || burst.keys.contains_key(&capture_id) {
            return Err(invalid_state_error!(format!("burst of capture {} is already prepared", capture_id)));
        }
        let key = Uuid::new_v4().to_string();
        debug!("prepare burst: capture {} key {}", capture_id, key);
        burst.is_bursting = true;
        burst.burst_num = 0;
        burst.burst_seq += 1;
        burst.keys.insert(capture_id, key);
        burst.images.insert(capture_id, Vec::new());
        Ok(())
    }

    pub fn reset_burst(&self) {
        let mut burst = self.burst_state();
        burst.is_bursting = false;
        burst.burst_num = 0;
    }

    pub fn reset_burst_key(&self, capture_id: CaptureId) {
        let mut burst = self.burst_state();
        burst.keys.remove(&capture_id);
        burst.images.remove(&capture_id);
        burst.expected.remove(&capture_id);
    }

    pub fn burst_key(&self, capture_id: CaptureId) -> Option<String> {
        self.burst_state().keys.get(&capture_id).cloned()
    }

    pub fn is_burst_capture(&self, capture_id: CaptureId) -> bool {
        self.burst_state().keys.contains_key(&capture_id)
    }

    pub fn is_bursting(&self) -> bool {
        self.burst_state().is_bursting
    }

    /// The first image recorded for a burst is its cover.
    pub fn is_burst_cover(&self, capture_id: CaptureId) -> bool {
        self.burst_state().images.get(&capture_id).map(|images| images.len() == 1).unwrap_or(false)
    }

    pub fn cur_burst_seq(&self, capture_id: CaptureId) -> usize {
        self.burst_state().images.get(&capture_id).map(Vec::len).unwrap_or(0)
    }

    /// Number of bursts this stream has prepared.
    pub fn burst_count(&self) -> u32 {
        self.burst_state().burst_seq
    }

    pub fn set_burst_images(&self, capture_id: CaptureId, image_id: &str) {
        let mut burst = self.burst_state();
        match burst.images.get_mut(&capture_id) {
            Some(images) => images.push(image_id.to_string()),
            None => {
                error!("no burst prepared for capture {}", capture_id);
                return;
            }
        }
        burst.retire_if_complete(capture_id);
    }

    /// Sets the declared size of a burst.
    pub fn set_burst_size(&self, capture_id: CaptureId, size: u32) {
        let mut burst = self.burst_state();
        if burst.keys.contains_key(&capture_id) {
            burst.expected.insert(capture_id, size);
            burst.retire_if_complete(capture_id);
        }
    }

    pub fn check_reset_burst_key(&self, capture_id: CaptureId) -> bool {
        self.burst_state().retire_if_complete(capture_id)
    }

    pub fn rotation(&self, capture_id: CaptureId) -> Option<i32> {
        self.rotation_map().get(&capture_id).copied()
    }

    pub fn erase_rotation(&self, capture_id: CaptureId) {
        self.rotation_map().remove(&capture_id);
    }

    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            has_producer: true,
            ..self.common.stream_info(StreamIntent::StillCapture)
        }
    }

    pub fn on_capture_started(&self, capture_id: CaptureId) {
        if let Some(callback) = self.callback() {
            callback.on_capture_started(capture_id);
        }
    }

    pub fn on_capture_ended(&self, capture_id: CaptureId, frame_count: i32) {
        if self.common.prepared_capture_id() == capture_id {
            self.common.reset_capture_id();
        }
        if let Some(callback) = self.callback() {
            callback.on_capture_ended(capture_id, frame_count);
        }
    }

    pub fn on_capture_error(&self, capture_id: CaptureId, error: StreamError) {
        if self.common.prepared_capture_id() == capture_id {
            self.common.reset_capture_id();
        }
        if self.is_burst_capture(capture_id) {
            self.reset_burst();
            self.reset_burst_key(capture_id);
        }
        self.capture_ready.store(true, Ordering::Release);
        if let Some(callback) = self.callback() {
            callback.on_capture_error(capture_id, error);
        }
    }

    pub fn on_frame_shutter(&self, capture_id: CaptureId, timestamp: u64) {
        if let Some(callback) = self.callback() {
            callback.on_frame_shutter(capture_id, timestamp);
        }
    }

    pub fn on_frame_shutter_end(&self, capture_id: CaptureId, timestamp: u64) {
        {
            let mut burst = self.burst_state();
            if burst.is_bursting {
                burst.burst_num += 1;
            }
        }
        if let Some(callback) = self.callback() {
            callback.on_frame_shutter_end(capture_id, timestamp);
        }
    }

    pub fn on_capture_ready(&self, capture_id: CaptureId, timestamp: u64) {
        let burst_ended = {
            let mut burst = self.burst_state();
            let was_bursting = burst.is_bursting;
            if was_bursting {
                let burst_num = burst.burst_num;
                burst.expected.insert(capture_id, burst_num);
                burst.is_bursting = false;
                burst.burst_num = 0;
                burst.retire_if_complete(capture_id);
            }
            was_bursting
        };
        if burst_ended && self.common.prepared_capture_id() == capture_id {
            self.common.reset_capture_id();
        }
        self.capture_ready.store(true, Ordering::Release);
        if let Some(callback) = self.callback() {
            callback.on_capture_ready(capture_id, timestamp);
        }
    }
}
