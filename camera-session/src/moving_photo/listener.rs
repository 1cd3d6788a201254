use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use camera_core::{
    buffer::{Surface, SurfaceBuffer, SurfaceListener},
    stream::Rotation,
};
use log::{debug, info};

use super::{
    drain::{DrainImageCallback, DrainImageManager},
    frame::FrameRecord,
};

/// Consumer of the moving-photo surface. Keeps the most recent frames in a
/// bounded queue and feeds them to registered drain requests.
///
/// Lock order is queue before drain registry.
pub struct MovingPhotoListener {
    surface: Arc<Surface>,
    capacity: usize,
    next_frame_id: AtomicU64,
    queue: Mutex<VecDeque<Arc<FrameRecord>>>,
    drains: Mutex<Vec<Arc<DrainImageManager>>>,
}

impl MovingPhotoListener {
    pub fn new(surface: Arc<Surface>, capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            surface,
            capacity,
            next_frame_id: AtomicU64::new(1),
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            drains: Mutex::new(Vec::new()),
        })
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Arc<FrameRecord>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drains(&self) -> MutexGuard<'_, Vec<Arc<DrainImageManager>>> {
        self.drains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cached_frame_count(&self) -> usize {
        self.queue().len()
    }

    pub fn drain_count(&self) -> usize {
        self.drains().len()
    }

    /// Frames currently cached, oldest first.
    pub fn cached_frames(&self) -> Vec<Arc<FrameRecord>> {
        self.queue().iter().cloned().collect()
    }

    /// Registers a drain request. Every cached frame is delivered right away,
    /// the most recent one marked as cover, and later frames follow until the
    /// request has seen the current cache size plus `capacity` frames.
    pub fn drain_out_image(&self, callback: Arc<dyn DrainImageCallback>) {
        let (snapshot, manager) = {
            let queue = self.queue();
            let manager = DrainImageManager::new(callback, queue.len() + self.capacity);
            let snapshot: Vec<Arc<FrameRecord>> = queue.iter().cloned().collect();
            self.drains().push(manager.clone());
            (snapshot, manager)
        };
        info!("drain out image: {} cached frames, target {}", snapshot.len(), manager.target());

        if let Some(cover) = snapshot.last() {
            cover.set_cover_frame();
        }
        for frame in snapshot {
            if manager.deliver(frame) {
                self.finish_manager(&manager, true);
                break;
            }
        }
    }

    fn finish_manager(&self, manager: &Arc<DrainImageManager>, finished: bool) {
        self.drains().retain(|m| !Arc::ptr_eq(m, manager));
        manager.drain_finish(finished);
    }

    pub fn remove_drain_image_manager(&self, callback: &Arc<dyn DrainImageCallback>) {
        self.drains().retain(|manager| !Arc::ptr_eq(manager.callback(), callback));
    }

    /// Force-finalizes every outstanding drain request as incomplete.
    pub fn stop_drain_out(&self) {
        let managers = std::mem::take(&mut *self.drains());
        if !managers.is_empty() {
            info!("stop drain out: {} outstanding requests", managers.len());
        }
        for manager in managers {
            manager.drain_finish(false);
        }
    }

    /// Releases every cached buffer back to the surface.
    pub fn clear_cache(&self) {
        let frames = std::mem::take(&mut *self.queue());
        debug!("clear moving photo cache: {} frames", frames.len());
        for frame in frames {
            frame.release_surface_buffer(&self.surface);
        }
    }
}

impl SurfaceListener for MovingPhotoListener {
    fn on_buffer_arrival(&self, buffer: SurfaceBuffer, timestamp: i64, transform: Rotation) {
        let frame = FrameRecord::new(self.next_frame_id.fetch_add(1, Ordering::Relaxed), buffer, timestamp, transform);
        let managers = {
            let mut queue = self.queue();
            while queue.len() >= self.capacity {
                if let Some(evicted) = queue.pop_front() {
                    evicted.release_surface_buffer(&self.surface);
                }
            }
            queue.push_back(frame.clone());
            self.drains().clone()
        };

        for manager in managers {
            if manager.deliver(frame.clone()) {
                self.finish_manager(&manager, true);
            }
        }
    }
}
