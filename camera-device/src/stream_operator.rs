use camera_core::{
    metadata::CameraMetadata,
    stream::{CaptureId, OperationMode, StreamId, StreamInfo},
    Result,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;

pub type StreamIds = SmallVec<[StreamId; 4]>;

#[derive(Clone, Debug, Default)]
pub struct CaptureInfo {
    pub stream_ids: StreamIds,
    pub settings: CameraMetadata,
    pub enable_shutter_callback: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureEndedInfo {
    pub stream_id: StreamId,
    pub frame_count: i32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum StreamError {
    #[default]
    Unknown = 0,
    BufferLost,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureErrorInfo {
    pub stream_id: StreamId,
    pub error: StreamError,
}

/// Hardware-side stream operator obtained from a bound device.
pub trait StreamOperator: Send + Sync {
    fn create_streams(&self, infos: &[StreamInfo]) -> Result<()>;
    fn commit_streams(&self, op_mode: OperationMode, settings: &CameraMetadata) -> Result<()>;
    fn capture(&self, capture_id: CaptureId, info: &CaptureInfo, is_streaming: bool) -> Result<()>;
    fn cancel_capture(&self, capture_id: CaptureId) -> Result<()>;
    fn release_streams(&self, stream_ids: &[StreamId]) -> Result<()>;
}

/// Asynchronous event sink the hardware layer reports into. Stream ids are
/// hardware ids except for `on_result`.
pub trait StreamOperatorCallback: Send + Sync {
    fn on_capture_started(&self, capture_id: CaptureId, stream_ids: &[StreamId]) -> Result<()>;
    fn on_capture_ended(&self, capture_id: CaptureId, infos: &[CaptureEndedInfo]) -> Result<()>;
    fn on_capture_error(&self, capture_id: CaptureId, infos: &[CaptureErrorInfo]) -> Result<()>;
    fn on_frame_shutter(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()>;
    fn on_frame_shutter_end(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()>;
    fn on_capture_ready(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()>;
    fn on_result(&self, stream_id: StreamId, result: &[u8]) -> Result<()>;
}
