mod capture;
mod depth;
mod metadata;
mod repeat;

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc, PoisonError, RwLock,
};

use camera_core::{
    invalid_state_error,
    metadata::CameraMetadata,
    stream::{CaptureId, ColorSpace, PixelFormat, StreamId, StreamInfo, StreamIntent, StreamType, CAPTURE_ID_UNSET, STREAM_ID_UNSET},
    Result,
};
use camera_device::{CaptureInfo, StreamOperator};
use log::{debug, error};
use smallvec::smallvec;

pub use capture::{StreamCapture, StreamCaptureCallback};
pub use depth::StreamDepth;
pub use metadata::{StreamMetadata, StreamMetadataCallback};
pub use repeat::{StreamRepeat, StreamRepeatCallback};

static NEXT_FWK_STREAM_ID: AtomicI32 = AtomicI32::new(1);
static NEXT_CAPTURE_ID: AtomicI32 = AtomicI32::new(1);

pub fn generate_fwk_stream_id() -> StreamId {
    NEXT_FWK_STREAM_ID.fetch_add(1, Ordering::Relaxed)
}

fn generate_capture_id() -> CaptureId {
    NEXT_CAPTURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// State shared by every logical stream type.
pub struct StreamCommon {
    stream_type: StreamType,
    fwk_stream_id: AtomicI32,
    hdi_stream_id: AtomicI32,
    prepared_capture_id: AtomicI32,
    width: u32,
    height: u32,
    format: PixelFormat,
    color_space: RwLock<ColorSpace>,
    stream_operator: RwLock<Option<Arc<dyn StreamOperator>>>,
    ability: RwLock<Option<Arc<CameraMetadata>>>,
}

impl StreamCommon {
    fn new(stream_type: StreamType, fwk_stream_id: StreamId, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            stream_type,
            fwk_stream_id: AtomicI32::new(fwk_stream_id),
            hdi_stream_id: AtomicI32::new(STREAM_ID_UNSET),
            prepared_capture_id: AtomicI32::new(CAPTURE_ID_UNSET),
            width,
            height,
            format,
            color_space: RwLock::new(ColorSpace::COLOR_SPACE_UNKNOWN),
            stream_operator: RwLock::new(None),
            ability: RwLock::new(None),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn fwk_stream_id(&self) -> StreamId {
        self.fwk_stream_id.load(Ordering::Acquire)
    }

    pub fn hdi_stream_id(&self) -> StreamId {
        self.hdi_stream_id.load(Ordering::Acquire)
    }

    pub fn set_hdi_stream_id(&self, stream_id: StreamId) {
        self.hdi_stream_id.store(stream_id, Ordering::Release);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn color_space(&self) -> ColorSpace {
        *self.color_space.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_color_space(&self, color_space: ColorSpace) {
        *self.color_space.write().unwrap_or_else(PoisonError::into_inner) = color_space;
    }

    pub fn prepared_capture_id(&self) -> CaptureId {
        self.prepared_capture_id.load(Ordering::Acquire)
    }

    fn prepare_capture_id(&self) -> CaptureId {
        let capture_id = generate_capture_id();
        self.prepared_capture_id.store(capture_id, Ordering::Release);
        capture_id
    }

    fn reset_capture_id(&self) {
        self.prepared_capture_id.store(CAPTURE_ID_UNSET, Ordering::Release);
    }

    pub fn is_linked(&self) -> bool {
        self.stream_operator.read().map(|operator| operator.is_some()).unwrap_or(false)
    }

    pub(crate) fn stream_operator(&self) -> Result<Arc<dyn StreamOperator>> {
        self.stream_operator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| invalid_state_error!(format!("stream {} is not linked", self.fwk_stream_id())))
    }

    pub fn ability(&self) -> Option<Arc<CameraMetadata>> {
        self.ability.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn link_input(&self, stream_operator: Arc<dyn StreamOperator>, ability: Arc<CameraMetadata>) -> Result<()> {
        if self.fwk_stream_id() == STREAM_ID_UNSET && self.stream_type != StreamType::Metadata {
            return Err(invalid_state_error!("stream is released"));
        }
        *self.stream_operator.write().unwrap_or_else(PoisonError::into_inner) = Some(stream_operator);
        *self.ability.write().unwrap_or_else(PoisonError::into_inner) = Some(ability);
        Ok(())
    }

    fn unlink_input(&self) {
        *self.stream_operator.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.ability.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_hdi_stream_id(STREAM_ID_UNSET);
        self.reset_capture_id();
    }

    /// Frees the hardware side of the stream. A delayed release leaves the
    /// hardware call to the owner, which batches the ids of every stream.
    fn release_stream(&self, is_delayed: bool) -> Result<()> {
        let hdi_stream_id = self.hdi_stream_id();
        let operator = self.stream_operator.write().unwrap_or_else(PoisonError::into_inner).take();
        let mut result = Ok(());
        if let Some(operator) = operator {
            if !is_delayed && hdi_stream_id != STREAM_ID_UNSET {
                result = operator.release_streams(&[hdi_stream_id]);
            }
        }
        *self.ability.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_hdi_stream_id(STREAM_ID_UNSET);
        self.reset_capture_id();
        self.fwk_stream_id.store(STREAM_ID_UNSET, Ordering::Release);
        result
    }

    fn stream_info(&self, intent: StreamIntent) -> StreamInfo {
        StreamInfo {
            stream_id: self.hdi_stream_id(),
            width: self.width,
            height: self.height,
            format: self.format,
            color_space: self.color_space(),
            intent,
            tunneled_mode: true,
            has_producer: false,
        }
    }

    /// Submits a repeating request carrying `settings` for this stream.
    fn start_streaming(&self, settings: &CameraMetadata) -> Result<()> {
        let operator = self.stream_operator()?;
        if self.prepared_capture_id() != CAPTURE_ID_UNSET {
            return Err(invalid_state_error!(format!("stream {} is already started", self.fwk_stream_id())));
        }

        let capture_id = self.prepare_capture_id();
        let info = CaptureInfo {
            stream_ids: smallvec![self.hdi_stream_id()],
            settings: settings.clone(),
            enable_shutter_callback: false,
        };
        debug!("start streaming: stream {} capture {}", self.fwk_stream_id(), capture_id);
        operator.capture(capture_id, &info, true).inspect_err(|err| {
            error!("start streaming failed: stream {}, {}", self.fwk_stream_id(), err);
            self.reset_capture_id();
        })
    }

    fn stop_streaming(&self) -> Result<()> {
        let capture_id = self.prepared_capture_id();
        if capture_id == CAPTURE_ID_UNSET {
            debug!("stream {} is not streaming", self.fwk_stream_id());
            return Ok(());
        }
        let operator = self.stream_operator()?;
        self.reset_capture_id();
        operator.cancel_capture(capture_id)
    }
}

/// A logical stream owned by a session.
#[derive(Clone)]
pub enum Stream {
    Repeat(Arc<StreamRepeat>),
    Capture(Arc<StreamCapture>),
    Metadata(Arc<StreamMetadata>),
    Depth(Arc<StreamDepth>),
}

impl Stream {
    pub fn common(&self) -> &StreamCommon {
        match self {
            Stream::Repeat(stream) => stream.common(),
            Stream::Capture(stream) => stream.common(),
            Stream::Metadata(stream) => stream.common(),
            Stream::Depth(stream) => stream.common(),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.common().stream_type()
    }

    pub fn fwk_stream_id(&self) -> StreamId {
        self.common().fwk_stream_id()
    }

    pub fn hdi_stream_id(&self) -> StreamId {
        self.common().hdi_stream_id()
    }

    pub fn set_hdi_stream_id(&self, stream_id: StreamId) {
        self.common().set_hdi_stream_id(stream_id)
    }

    pub fn set_color_space(&self, color_space: ColorSpace) {
        self.common().set_color_space(color_space)
    }

    pub fn link_input(&self, stream_operator: Arc<dyn StreamOperator>, ability: Arc<CameraMetadata>) -> Result<()> {
        self.common().link_input(stream_operator, ability)
    }

    /// Detaches the stream from the hardware. Running requests are stopped first.
    pub fn unlink_input(&self) -> Result<()> {
        let result = if self.common().is_linked() {
            self.stop()
        } else {
            Ok(())
        };
        self.common().unlink_input();
        result
    }

    pub fn release_stream(&self, is_delayed: bool) -> Result<()> {
        if let Stream::Repeat(stream) = self {
            stream.release_producer();
        }
        self.common().release_stream(is_delayed)
    }

    pub fn stream_info(&self) -> StreamInfo {
        match self {
            Stream::Repeat(stream) => stream.stream_info(),
            Stream::Capture(stream) => stream.stream_info(),
            Stream::Metadata(stream) => stream.stream_info(),
            Stream::Depth(stream) => stream.stream_info(),
        }
    }

    /// Stops the stream by its type's policy: capture streams are cancelled.
    pub fn stop(&self) -> Result<()> {
        match self {
            Stream::Repeat(stream) => stream.stop(),
            Stream::Capture(stream) => stream.cancel_capture(),
            Stream::Metadata(stream) => stream.stop(),
            Stream::Depth(stream) => stream.stop(),
        }
    }

    /// Reference identity, two handles to the same stream object.
    pub fn ptr_eq(&self, other: &Stream) -> bool {
        match (self, other) {
            (Stream::Repeat(a), Stream::Repeat(b)) => Arc::ptr_eq(a, b),
            (Stream::Capture(a), Stream::Capture(b)) => Arc::ptr_eq(a, b),
            (Stream::Metadata(a), Stream::Metadata(b)) => Arc::ptr_eq(a, b),
            (Stream::Depth(a), Stream::Depth(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_repeat(&self) -> Option<&Arc<StreamRepeat>> {
        match self {
            Stream::Repeat(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_capture(&self) -> Option<&Arc<StreamCapture>> {
        match self {
            Stream::Capture(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&Arc<StreamMetadata>> {
        match self {
            Stream::Metadata(stream) => Some(stream),
            _ => None,
        }
    }
}

impl From<Arc<StreamRepeat>> for Stream {
    fn from(stream: Arc<StreamRepeat>) -> Self {
        Stream::Repeat(stream)
    }
}

impl From<Arc<StreamCapture>> for Stream {
    fn from(stream: Arc<StreamCapture>) -> Self {
        Stream::Capture(stream)
    }
}

impl From<Arc<StreamMetadata>> for Stream {
    fn from(stream: Arc<StreamMetadata>) -> Self {
        Stream::Metadata(stream)
    }
}

impl From<Arc<StreamDepth>> for Stream {
    fn from(stream: Arc<StreamDepth>) -> Self {
        Stream::Depth(stream)
    }
}
