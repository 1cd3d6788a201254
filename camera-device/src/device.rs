use std::sync::{Arc, Weak};

use camera_core::{
    metadata::{CameraMetadata, MetadataTag},
    stream::{OperationMode, StreamId, StreamInfo},
    Result,
};

use crate::stream_operator::{StreamOperator, StreamOperatorCallback};

#[derive(Clone, Debug)]
pub struct DeviceInformation {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceErrorKind {
    RequestTimeout, // Device did not answer in time
    DriverError,    // Driver reported a fatal error
    DevicePreempt,  // Another client took the device
    DeviceDisconnect,
    DeviceFallback,
}

/// A camera device as seen by a capture session. Implementations are shared
/// between the session and the hardware layer, all methods take `&self`.
pub trait CameraDevice: Send + Sync {
    fn info(&self) -> &DeviceInformation;

    fn id(&self) -> &str {
        &self.info().id
    }

    fn stream_operator(&self) -> Option<Arc<dyn StreamOperator>>;
    fn device_ability(&self) -> Option<Arc<CameraMetadata>>;

    /// Creates every stream in `infos` and commits them as one transaction.
    fn create_and_commit_streams(&self, infos: &[StreamInfo], ability: &CameraMetadata, op_mode: OperationMode) -> Result<()>;
    fn release_streams(&self, stream_ids: &[StreamId]) -> Result<()>;
    fn update_streams(&self, infos: &[StreamInfo]) -> Result<()>;
    fn clone_cached_settings(&self) -> CameraMetadata;
    fn secure_camera_seq(&self) -> Result<u64>;
    fn check_moving_photo_supported(&self, op_mode: OperationMode) -> bool;

    /// Routes hardware events to `callback`, `None` detaches the current target.
    fn set_stream_operator_callback(&self, callback: Option<Weak<dyn StreamOperatorCallback>>);
    fn dispatch_default_settings(&self) -> Result<()>;
    fn reset_device_settings(&self) -> Result<()>;

    fn generate_hdi_stream_id(&self) -> StreamId;
    fn reset_hdi_stream_id(&self);

    fn update_setting_once(&self, settings: &CameraMetadata) -> Result<()>;
    fn get_status(&self, tags: &[MetadataTag]) -> Result<CameraMetadata>;

    fn is_muted(&self) -> bool {
        false
    }

    fn sensor_orientation(&self) -> i32 {
        self.device_ability().and_then(|ability| ability.find_i32(MetadataTag::SensorOrientation)).unwrap_or(0)
    }

    fn on_error(&self, kind: DeviceErrorKind, message: i32);
    fn release(&self) -> Result<()>;
}
