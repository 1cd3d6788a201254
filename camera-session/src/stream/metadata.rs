use std::sync::{Arc, PoisonError, RwLock};

use camera_core::{
    metadata::CameraMetadata,
    stream::{PixelFormat, StreamId, StreamInfo, StreamIntent, StreamType},
    Result,
};
use log::debug;

use super::{generate_fwk_stream_id, StreamCommon};

pub trait StreamMetadataCallback: Send + Sync {
    fn on_metadata_result(&self, stream_id: StreamId, result: &[u8]);
}

/// Carries per-frame metadata results from the hardware to one consumer.
pub struct StreamMetadata {
    common: StreamCommon,
    callback: RwLock<Option<Arc<dyn StreamMetadataCallback>>>,
}

impl StreamMetadata {
    pub fn new() -> Arc<Self> {
        Self::with_stream_id(generate_fwk_stream_id())
    }

    pub fn with_stream_id(fwk_stream_id: StreamId) -> Arc<Self> {
        Arc::new(Self {
            common: StreamCommon::new(StreamType::Metadata, fwk_stream_id, PixelFormat::BLOB, 0, 0),
            callback: RwLock::new(None),
        })
    }

    pub fn common(&self) -> &StreamCommon {
        &self.common
    }

    pub fn set_callback(&self, callback: Arc<dyn StreamMetadataCallback>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn start(&self, settings: &CameraMetadata) -> Result<()> {
        self.common.start_streaming(settings)
    }

    pub fn stop(&self) -> Result<()> {
        self.common.stop_streaming()
    }

    pub fn stream_info(&self) -> StreamInfo {
        self.common.stream_info(StreamIntent::Analyze)
    }

    pub fn on_metadata_result(&self, result: &[u8]) -> Result<()> {
        let callback = self.callback.read().unwrap_or_else(PoisonError::into_inner).clone();
        match callback {
            Some(callback) => callback.on_metadata_result(self.common.fwk_stream_id(), result),
            None => debug!("metadata stream {} has no consumer", self.common.fwk_stream_id()),
        }
        Ok(())
    }
}
