use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};

use camera_core::{
    buffer::Surface,
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    stream::{PixelFormat, RepeatStreamType, Rotation, StreamId, StreamInfo, StreamIntent, StreamType},
    Result,
};
use camera_device::StreamError;
use log::{debug, info};

use super::{generate_fwk_stream_id, StreamCommon};

pub trait StreamRepeatCallback: Send + Sync {
    fn on_frame_started(&self);
    fn on_frame_ended(&self, frame_count: i32);
    fn on_frame_error(&self, error: StreamError);
}

type DeferredSurfaceCallback = Box<dyn FnOnce() + Send>;

/// A continuously producing stream: preview, video, sketch or live photo.
pub struct StreamRepeat {
    common: StreamCommon,
    repeat_type: RepeatStreamType,
    producer: RwLock<Option<Arc<Surface>>>,
    callback: RwLock<Option<Arc<dyn StreamRepeatCallback>>>,
    sketch: Mutex<Option<Arc<StreamRepeat>>>,
    // Settings of a start request issued before the producer attached.
    pending_settings: Mutex<Option<CameraMetadata>>,
    deferred_surface_callback: Mutex<Option<DeferredSurfaceCallback>>,
    mirror: AtomicBool,
    transform: RwLock<Rotation>,
}

impl StreamRepeat {
    pub fn new(producer: Option<Arc<Surface>>, format: PixelFormat, width: u32, height: u32, repeat_type: RepeatStreamType) -> Arc<Self> {
        Self::with_stream_id(generate_fwk_stream_id(), producer, format, width, height, repeat_type)
    }

    pub fn with_stream_id(
        fwk_stream_id: StreamId,
        producer: Option<Arc<Surface>>,
        format: PixelFormat,
        width: u32,
        height: u32,
        repeat_type: RepeatStreamType,
    ) -> Arc<Self> {
        Arc::new(Self {
            common: StreamCommon::new(StreamType::Repeat, fwk_stream_id, format, width, height),
            repeat_type,
            producer: RwLock::new(producer),
            callback: RwLock::new(None),
            sketch: Mutex::new(None),
            pending_settings: Mutex::new(None),
            deferred_surface_callback: Mutex::new(None),
            mirror: AtomicBool::new(false),
            transform: RwLock::new(Rotation::None),
        })
    }

    pub fn common(&self) -> &StreamCommon {
        &self.common
    }

    pub fn repeat_type(&self) -> RepeatStreamType {
        self.repeat_type
    }

    pub fn producer(&self) -> Option<Arc<Surface>> {
        self.producer.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn has_producer(&self) -> bool {
        self.producer.read().map(|producer| producer.is_some()).unwrap_or(false)
    }

    pub(super) fn release_producer(&self) {
        self.producer.write().unwrap_or_else(PoisonError::into_inner).take();
        self.pending_settings.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.deferred_surface_callback.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn set_callback(&self, callback: Arc<dyn StreamRepeatCallback>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn callback(&self) -> Option<Arc<dyn StreamRepeatCallback>> {
        self.callback.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_mirror(&self, mirror: bool) {
        self.mirror.store(mirror, Ordering::Release);
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror.load(Ordering::Acquire)
    }

    pub fn start(&self, settings: &CameraMetadata) -> Result<()> {
        if !self.has_producer() {
            info!("stream {} has no producer yet, start deferred", self.common.fwk_stream_id());
            *self.pending_settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
            return Ok(());
        }

        if self.repeat_type == RepeatStreamType::LivePhoto && self.is_mirror() {
            let mut settings = settings.clone();
            settings.add_entry(MetadataTag::ControlMirror, MetadataValue::Byte(vec![1]));
            return self.common.start_streaming(&settings);
        }
        self.common.start_streaming(settings)
    }

    pub fn stop(&self) -> Result<()> {
        self.pending_settings.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.common.stop_streaming()
    }

    /// Installs the one-shot callback fired when a deferred producer attaches.
    pub fn set_deferred_surface_callback(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.deferred_surface_callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn has_deferred_surface_callback(&self) -> bool {
        self.deferred_surface_callback.lock().map(|callback| callback.is_some()).unwrap_or(false)
    }

    /// Attaches the producer of a deferred preview, resumes a pending start and
    /// fires the deferred-surface callback once.
    pub fn add_deferred_surface(&self, producer: Arc<Surface>) -> Result<()> {
        producer.set_transform(self.transform());
        *self.producer.write().unwrap_or_else(PoisonError::into_inner) = Some(producer);

        let pending = self.pending_settings.lock().unwrap_or_else(PoisonError::into_inner).take();
        let result = match pending {
            Some(settings) if self.common.is_linked() => self.start(&settings),
            _ => Ok(()),
        };

        let callback = self.deferred_surface_callback.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(callback) = callback {
            debug!("stream {} deferred surface attached", self.common.fwk_stream_id());
            callback();
        }
        result
    }

    /// Declares or drops the low-resolution sketch companion of a preview.
    pub fn enable_sketch(&self, enable: bool) -> Option<Arc<StreamRepeat>> {
        let mut sketch = self.sketch.lock().unwrap_or_else(PoisonError::into_inner);
        if !enable || self.repeat_type != RepeatStreamType::Preview {
            *sketch = None;
            return None;
        }
        if sketch.is_none() {
            let (width, height) = ((self.common.width() / 2).max(1), (self.common.height() / 2).max(1));
            let surface = Surface::new("sketch", width, height, self.common.format());
            *sketch = Some(StreamRepeat::new(Some(surface), self.common.format(), width, height, RepeatStreamType::Sketch));
        }
        sketch.clone()
    }

    pub fn sketch_stream(&self) -> Option<Arc<StreamRepeat>> {
        self.sketch.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_transform(&self, transform: Rotation) {
        *self.transform.write().unwrap_or_else(PoisonError::into_inner) = transform;
        if let Some(producer) = self.producer() {
            producer.set_transform(transform);
        }
    }

    pub fn transform(&self) -> Rotation {
        *self.transform.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stream_info(&self) -> StreamInfo {
        let intent = match self.repeat_type {
            RepeatStreamType::Preview | RepeatStreamType::Sketch => StreamIntent::Preview,
            RepeatStreamType::Video | RepeatStreamType::LivePhoto => StreamIntent::Video,
        };
        StreamInfo {
            has_producer: self.has_producer(),
            ..self.common.stream_info(intent)
        }
    }

    pub fn on_frame_started(&self) {
        if let Some(callback) = self.callback() {
            callback.on_frame_started();
        }
    }

    pub fn on_frame_ended(&self, frame_count: i32) {
        if let Some(callback) = self.callback() {
            callback.on_frame_ended(frame_count);
        }
    }

    pub fn on_frame_error(&self, error: StreamError) {
        if let Some(callback) = self.callback() {
            callback.on_frame_error(error);
        }
    }
}
