use std::sync::{
    atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering},
    Arc, RwLock, Weak,
};

use crossbeam_queue::SegQueue;
use log::{debug, warn};

use crate::{
    stream::{PixelFormat, Rotation},
    Result,
};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

pub struct SurfaceBuffer {
    seq: u32,
    data: Box<[u8]>,
    width: u32,
    height: u32,
    surface_id: u64,
}

impl SurfaceBuffer {
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn surface_id(&self) -> u64 {
        self.surface_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Consumer side of a surface, notified for every flushed buffer.
pub trait SurfaceListener: Send + Sync {
    fn on_buffer_arrival(&self, buffer: SurfaceBuffer, timestamp: i64, transform: Rotation);
}

/// A producer/consumer buffer queue. Buffers handed to the consumer stay out
/// of the free queue until the consumer releases them back.
pub struct Surface {
    id: u64,
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    free: SegQueue<SurfaceBuffer>,
    next_seq: AtomicU32,
    in_flight: AtomicUsize,
    released: AtomicUsize,
    transform: RwLock<Rotation>,
    listener: RwLock<Option<Weak<dyn SurfaceListener>>>,
}

impl Surface {
    pub fn new(name: &str, width: u32, height: u32, format: PixelFormat) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            width,
            height,
            format,
            free: SegQueue::new(),
            next_seq: AtomicU32::new(1),
            in_flight: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            transform: RwLock::new(Rotation::None),
            listener: RwLock::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
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

    fn buffer_size(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        match self.format {
            PixelFormat::RGBA_8888 => pixels * 4,
            PixelFormat::YCBCR_P010 | PixelFormat::YCRCB_P010 => pixels * 3,
            PixelFormat::DEPTH_16 => pixels * 2,
            _ => pixels * 3 / 2,
        }
    }

    /// Dequeues a free buffer or allocates a new one.
    pub fn request_buffer(&self) -> SurfaceBuffer {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if let Some(buffer) = self.free.pop() {
            return buffer;
        }

        SurfaceBuffer {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            data: vec![0u8; self.buffer_size()].into_boxed_slice(),
            width: self.width,
            height: self.height,
            surface_id: self.id,
        }
    }

    /// Hands a filled buffer to the consumer. Without a consumer the buffer
    /// goes straight back to the free queue.
    pub fn flush_buffer(&self, buffer: SurfaceBuffer, timestamp: i64) -> Result<()> {
        let listener = self.listener.read().map_err(|err| crate::unknown_error!(err.to_string()))?.as_ref().and_then(Weak::upgrade);
        match listener {
            Some(listener) => {
                listener.on_buffer_arrival(buffer, timestamp, self.transform());
            }
            None => {
                debug!("surface {} has no consumer, dropping buffer {}", self.name, buffer.seq);
                self.recycle_buffer(buffer);
            }
        }
        Ok(())
    }

    /// Returns a consumed buffer to the free queue.
    pub fn release_buffer(&self, buffer: SurfaceBuffer) {
        if buffer.surface_id != self.id {
            warn!("buffer {} does not belong to surface {}", buffer.seq, self.name);
            return;
        }
        self.released.fetch_add(1, Ordering::AcqRel);
        self.recycle_buffer(buffer);
    }

    fn recycle_buffer(&self, buffer: SurfaceBuffer) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.free.push(buffer);
    }

    pub fn set_listener(&self, listener: Weak<dyn SurfaceListener>) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = Some(listener);
        }
    }

    pub fn clear_listener(&self) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = None;
        }
    }

    pub fn set_transform(&self, transform: Rotation) {
        if let Ok(mut slot) = self.transform.write() {
            *slot = transform;
        }
    }

    pub fn transform(&self) -> Rotation {
        self.transform.read().map(|transform| *transform).unwrap_or_default()
    }

    /// Number of buffers released back by the consumer.
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    /// Number of buffers currently held by the producer or the consumer.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}
