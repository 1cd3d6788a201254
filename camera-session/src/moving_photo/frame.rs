use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use camera_core::{
    buffer::{Surface, SurfaceBuffer},
    stream::Rotation,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FrameStatus {
    #[default]
    Idle,
    Encoding,
    FinishCache,
}

/// One cached frame. The surface buffer is held until the frame is evicted
/// from the cache.
pub struct FrameRecord {
    id: u64,
    timestamp: i64,
    transform: Rotation,
    buffer: Mutex<Option<SurfaceBuffer>>,
    status: Mutex<FrameStatus>,
    encoded: Mutex<Option<Vec<u8>>>,
    cover: AtomicBool,
}

impl FrameRecord {
    pub fn new(id: u64, buffer: SurfaceBuffer, timestamp: i64, transform: Rotation) -> Arc<Self> {
        Arc::new(Self {
            id,
            timestamp,
            transform,
            buffer: Mutex::new(Some(buffer)),
            status: Mutex::new(FrameStatus::Idle),
            encoded: Mutex::new(None),
            cover: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn transform(&self) -> Rotation {
        self.transform
    }

    pub fn status(&self) -> FrameStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, status: FrameStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn is_idle(&self) -> bool {
        self.status() == FrameStatus::Idle
    }

    pub fn is_finish_cache(&self) -> bool {
        self.status() == FrameStatus::FinishCache
    }

    pub fn set_cover_frame(&self) {
        self.cover.store(true, Ordering::Release);
    }

    pub fn is_cover_frame(&self) -> bool {
        self.cover.load(Ordering::Acquire)
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.lock().map(|buffer| buffer.is_some()).unwrap_or(false)
    }

    /// Runs `f` over the raw pixel data, `None` once the buffer is released.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|buffer| f(buffer.data()))
    }

    pub fn set_encoded_buffer(&self, data: Vec<u8>) {
        *self.encoded.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
    }

    pub fn encoded_len(&self) -> Option<usize> {
        self.encoded.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(Vec::len)
    }

    /// Hands the buffer back to `surface`, at most once.
    pub fn release_surface_buffer(&self, surface: &Surface) -> bool {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner).take();
        match buffer {
            Some(buffer) => {
                surface.release_buffer(buffer);
                true
            }
            None => false,
        }
    }
}
