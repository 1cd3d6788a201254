use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use camera_core::stream::{StreamId, StreamType, STREAM_ID_UNSET};
use log::{debug, warn};

use crate::stream::Stream;

/// Streams of one session bucketed by type. Lookups and snapshots return
/// cloned handles, callers never hold the container lock while calling into
/// a stream.
#[derive(Default)]
pub struct StreamContainer {
    streams: Mutex<BTreeMap<StreamType, Vec<Stream>>>,
}

fn sort_by_fwk_id(streams: &mut [Stream]) {
    streams.sort_by_key(|stream| stream.fwk_stream_id());
}

impl StreamContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<StreamType, Vec<Stream>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_stream(&self, stream: Stream) -> bool {
        let mut streams = self.lock();
        let bucket = streams.entry(stream.stream_type()).or_default();
        if bucket.iter().any(|s| s.ptr_eq(&stream)) {
            warn!("stream {} is already in the container", stream.fwk_stream_id());
            return false;
        }
        debug!("add stream: type {} id {}", stream.stream_type(), stream.fwk_stream_id());
        bucket.push(stream);
        true
    }

    pub fn remove_stream(&self, stream: &Stream) -> bool {
        let mut streams = self.lock();
        let Some(bucket) = streams.get_mut(&stream.stream_type()) else {
            return false;
        };
        match bucket.iter().position(|s| s.ptr_eq(stream)) {
            Some(index) => {
                bucket.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get_stream(&self, fwk_stream_id: StreamId) -> Option<Stream> {
        if fwk_stream_id == STREAM_ID_UNSET {
            return None;
        }
        self.lock().values().flatten().find(|stream| stream.fwk_stream_id() == fwk_stream_id).cloned()
    }

    pub fn get_hdi_stream(&self, hdi_stream_id: StreamId) -> Option<Stream> {
        if hdi_stream_id == STREAM_ID_UNSET {
            return None;
        }
        self.lock().values().flatten().find(|stream| stream.hdi_stream_id() == hdi_stream_id).cloned()
    }

    /// Streams of one type, ascending by framework id.
    pub fn get_streams(&self, stream_type: StreamType) -> Vec<Stream> {
        let mut streams = self.lock().get(&stream_type).cloned().unwrap_or_default();
        sort_by_fwk_id(&mut streams);
        streams
    }

    /// Every stream, ascending by framework id.
    pub fn get_all_streams(&self) -> Vec<Stream> {
        let mut streams: Vec<Stream> = self.lock().values().flatten().cloned().collect();
        sort_by_fwk_id(&mut streams);
        streams
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
