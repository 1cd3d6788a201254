use std::sync::{Arc, PoisonError};

use camera_core::{
    error::Error,
    stream::{CaptureId, StreamId},
    Result,
};
use camera_device::{CaptureEndedInfo, CaptureErrorInfo, StreamOperatorCallback};
use log::{debug, error};

use super::CaptureSession;
use crate::stream::{Stream, StreamCapture};

impl CaptureSession {
    // Every id must resolve before any stream is notified.
    fn resolve_hdi_streams(&self, stream_ids: impl IntoIterator<Item = StreamId>) -> Result<Vec<Stream>> {
        stream_ids
            .into_iter()
            .map(|stream_id| {
                self.streams.get_hdi_stream(stream_id).ok_or_else(|| {
                    error!("session {}: hdi stream {} not found", self.session_id, stream_id);
                    Error::InvalidArgument(format!("hdi stream {} not found", stream_id).into())
                })
            })
            .collect()
    }

    fn resolve_capture_streams(&self, stream_ids: &[StreamId]) -> Result<Vec<Arc<StreamCapture>>> {
        self.resolve_hdi_streams(stream_ids.iter().copied())?
            .into_iter()
            .map(|stream| match stream {
                Stream::Capture(capture) => Ok(capture),
                other => {
                    error!("session {}: hdi stream {} is not a capture stream", self.session_id, other.hdi_stream_id());
                    Err(Error::InvalidArgument(format!("hdi stream {} is not a capture stream", other.hdi_stream_id()).into()))
                }
            })
            .collect()
    }
}

impl StreamOperatorCallback for CaptureSession {
    fn on_capture_started(&self, capture_id: CaptureId, stream_ids: &[StreamId]) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("capture {} started on {:?}", capture_id, stream_ids);
        for stream in self.resolve_hdi_streams(stream_ids.iter().copied())? {
            match stream {
                Stream::Repeat(repeat) => repeat.on_frame_started(),
                Stream::Capture(capture) => capture.on_capture_started(capture_id),
                _ => {}
            }
        }
        Ok(())
    }

    fn on_capture_ended(&self, capture_id: CaptureId, infos: &[CaptureEndedInfo]) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("capture {} ended on {} streams", capture_id, infos.len());
        let streams = self.resolve_hdi_streams(infos.iter().map(|info| info.stream_id))?;
        for (stream, info) in streams.into_iter().zip(infos) {
            match stream {
                Stream::Repeat(repeat) => repeat.on_frame_ended(info.frame_count),
                Stream::Capture(capture) => capture.on_capture_ended(capture_id, info.frame_count),
                _ => {}
            }
        }
        Ok(())
    }

    fn on_capture_error(&self, capture_id: CaptureId, infos: &[CaptureErrorInfo]) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("capture {} failed on {} streams", capture_id, infos.len());
        let streams = self.resolve_hdi_streams(infos.iter().map(|info| info.stream_id))?;
        for (stream, info) in streams.into_iter().zip(infos) {
            match stream {
                Stream::Repeat(repeat) => repeat.on_frame_error(info.error),
                Stream::Capture(capture) => {
                    capture.erase_rotation(capture_id);
                    capture.on_capture_error(capture_id, info.error);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn on_frame_shutter(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        for capture in self.resolve_capture_streams(stream_ids)? {
            capture.on_frame_shutter(capture_id, timestamp);
            self.start_moving_photo_encode(capture.rotation(capture_id).unwrap_or(0), timestamp);
        }
        Ok(())
    }

    fn on_frame_shutter_end(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        for capture in self.resolve_capture_streams(stream_ids)? {
            capture.on_frame_shutter_end(capture_id, timestamp);
            capture.erase_rotation(capture_id);
        }
        Ok(())
    }

    fn on_capture_ready(&self, capture_id: CaptureId, stream_ids: &[StreamId], timestamp: u64) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        for capture in self.resolve_capture_streams(stream_ids)? {
            capture.on_capture_ready(capture_id, timestamp);
        }
        Ok(())
    }

    fn on_result(&self, stream_id: StreamId, result: &[u8]) -> Result<()> {
        let _guard = self.cb_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let stream = self
            .streams
            .get_stream(stream_id)
            .filter(|stream| stream.as_metadata().is_some())
            .or_else(|| self.streams.get_hdi_stream(stream_id).filter(|stream| stream.as_metadata().is_some()));
        match stream.as_ref().and_then(Stream::as_metadata) {
            Some(metadata) => metadata.on_metadata_result(result),
            None => {
                error!("session {}: metadata stream {} not found", self.session_id, stream_id);
                Err(Error::InvalidArgument(format!("metadata stream {} not found", stream_id).into()))
            }
        }
    }
}
