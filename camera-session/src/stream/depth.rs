use std::sync::Arc;

use camera_core::{
    metadata::CameraMetadata,
    stream::{PixelFormat, StreamId, StreamInfo, StreamIntent, StreamType},
    Result,
};

use super::{generate_fwk_stream_id, StreamCommon};

pub struct StreamDepth {
    common: StreamCommon,
}

impl StreamDepth {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Self::with_stream_id(generate_fwk_stream_id(), width, height)
    }

    pub fn with_stream_id(fwk_stream_id: StreamId, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            common: StreamCommon::new(StreamType::Depth, fwk_stream_id, PixelFormat::DEPTH_16, width, height),
        })
    }

    pub fn common(&self) -> &StreamCommon {
        &self.common
    }

    pub fn start(&self, settings: &CameraMetadata) -> Result<()> {
        self.common.start_streaming(settings)
    }

    pub fn stop(&self) -> Result<()> {
        self.common.stop_streaming()
    }

    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            has_producer: true,
            ..self.common.stream_info(StreamIntent::Custom)
        }
    }
}
