use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, PoisonError, Weak,
};

use log::{debug, info};

use super::{frame::FrameRecord, listener::MovingPhotoListener, video_cache::MovingPhotoVideoCache};

pub trait DrainImageCallback: Send + Sync {
    fn on_drain_image(&self, frame: Arc<FrameRecord>);
    fn on_drain_image_finish(&self, finished: bool);
}

/// Delivery cursor of one drain request over the shared frame cache.
pub struct DrainImageManager {
    callback: Arc<dyn DrainImageCallback>,
    target: usize,
    delivered: AtomicUsize,
    finished: AtomicBool,
}

impl DrainImageManager {
    pub fn new(callback: Arc<dyn DrainImageCallback>, target: usize) -> Arc<Self> {
        Arc::new(Self {
            callback,
            target,
            delivered: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        })
    }

    pub fn callback(&self) -> &Arc<dyn DrainImageCallback> {
        &self.callback
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Delivers one frame. Returns true when this delivery reached the target.
    pub fn deliver(&self, frame: Arc<FrameRecord>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.callback.on_drain_image(frame);
        self.delivered.fetch_add(1, Ordering::AcqRel) + 1 == self.target
    }

    pub fn drain_finish(&self, finished: bool) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("drain finished: delivered {} of {}, complete {}", self.delivered(), self.target, finished);
        self.callback.on_drain_image_finish(finished);
    }
}

/// Collects the frames of one moving-photo clip and hands them to the video
/// cache once the drain completes.
pub struct SessionDrainImageCallback {
    weak_self: Weak<SessionDrainImageCallback>,
    frames: Mutex<Vec<Arc<FrameRecord>>>,
    listener: Weak<MovingPhotoListener>,
    video_cache: Arc<MovingPhotoVideoCache>,
    timestamp: u64,
    rotation: i32,
}

impl SessionDrainImageCallback {
    pub fn new(listener: Weak<MovingPhotoListener>, video_cache: Arc<MovingPhotoVideoCache>, timestamp: u64, rotation: i32) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            frames: Mutex::new(Vec::new()),
            listener,
            video_cache,
            timestamp,
            rotation,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl DrainImageCallback for SessionDrainImageCallback {
    fn on_drain_image(&self, frame: Arc<FrameRecord>) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).push(frame.clone());
        if frame.is_idle() {
            self.video_cache.cache_frame(frame);
        } else if frame.is_finish_cache() {
            self.video_cache.on_image_encoded(frame, true);
        }
    }

    fn on_drain_image_finish(&self, finished: bool) {
        let frames = std::mem::take(&mut *self.frames.lock().unwrap_or_else(PoisonError::into_inner));
        info!("drain of shutter {} collected {} frames", self.timestamp, frames.len());
        self.video_cache.get_frame_cached_result(frames, self.timestamp, self.rotation);

        if finished {
            if let (Some(listener), Some(this)) = (self.listener.upgrade(), self.weak_self.upgrade()) {
                let callback: Arc<dyn DrainImageCallback> = this;
                listener.remove_drain_image_manager(&callback);
            }
        }
    }
}
