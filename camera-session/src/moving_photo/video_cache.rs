use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use log::{debug, info, warn};

use super::{
    frame::{FrameRecord, FrameStatus},
    task_manager::TaskManager,
};

type CachedFrameEnd = Box<dyn FnOnce(Vec<Arc<FrameRecord>>) + Send>;

struct HandleState {
    pending: HashSet<u64>,
    successes: Vec<Arc<FrameRecord>>,
    end: Option<CachedFrameEnd>,
}

/// Waits for the encode results of one clip's frames, then runs its end
/// callback once with the frames that encoded successfully.
pub struct CachedFrameCallbackHandle {
    state: Mutex<HandleState>,
}

impl CachedFrameCallbackHandle {
    pub fn new(pending: HashSet<u64>, successes: Vec<Arc<FrameRecord>>, end: CachedFrameEnd) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HandleState {
                pending,
                successes,
                end: Some(end),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.state().end.is_none()
    }

    /// Records the outcome of one frame. Returns true once the handle has
    /// finished.
    pub fn on_cache_frame_finish(&self, frame: &Arc<FrameRecord>, succeeded: bool) -> bool {
        let end = {
            let mut state = self.state();
            if state.end.is_none() {
                return true;
            }
            if !state.pending.remove(&frame.id()) {
                return false;
            }
            if succeeded {
                state.successes.push(frame.clone());
            }
            if !state.pending.is_empty() {
                return false;
            }
            state.end.take().map(|end| (end, std::mem::take(&mut state.successes)))
        };
        if let Some((end, frames)) = end {
            end(frames);
        }
        true
    }

    fn finish_if_settled(&self) -> bool {
        let end = {
            let mut state = self.state();
            if !state.pending.is_empty() {
                return false;
            }
            state.end.take().map(|end| (end, std::mem::take(&mut state.successes)))
        };
        if let Some((end, frames)) = end {
            end(frames);
        }
        true
    }

    /// Stops waiting for pending frames and runs the end callback with the
    /// frames encoded so far.
    pub fn abort(&self) {
        let end = {
            let mut state = self.state();
            state.pending.clear();
            state.end.take().map(|end| (end, std::mem::take(&mut state.successes)))
        };
        if let Some((end, frames)) = end {
            debug!("abort clip with {} encoded frames", frames.len());
            end(frames);
        }
    }
}

/// Routes cached frames to the encoder and clip requests to the muxer.
pub struct MovingPhotoVideoCache {
    weak_self: Weak<MovingPhotoVideoCache>,
    task_manager: Arc<TaskManager>,
    handles: Mutex<Vec<Arc<CachedFrameCallbackHandle>>>,
}

impl MovingPhotoVideoCache {
    pub fn new(task_manager: Arc<TaskManager>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            task_manager,
            handles: Mutex::new(Vec::new()),
        })
    }

    fn handles(&self) -> MutexGuard<'_, Vec<Arc<CachedFrameCallbackHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn task_manager(&self) -> &Arc<TaskManager> {
        &self.task_manager
    }

    pub fn pending_handle_count(&self) -> usize {
        self.handles().len()
    }

    /// Queues `frame` for encoding.
    pub fn cache_frame(&self, frame: Arc<FrameRecord>) {
        frame.set_status(FrameStatus::Encoding);
        let weak_self = self.weak_self.clone();
        let submitted = self.task_manager.encode_video_buffer(frame.clone(), move |frame, encoded| {
            if let Some(cache) = weak_self.upgrade() {
                cache.on_image_encoded(frame, encoded);
            }
        });
        if !submitted {
            warn!("frame {} was not queued for encoding", frame.id());
            frame.set_status(FrameStatus::Idle);
            self.on_image_encoded(frame, false);
        }
    }

    pub fn on_image_encoded(&self, frame: Arc<FrameRecord>, encoded: bool) {
        let handles = self.handles().clone();
        let finished: Vec<_> = handles.into_iter().filter(|handle| handle.on_cache_frame_finish(&frame, encoded)).collect();
        if !finished.is_empty() {
            self.handles().retain(|handle| !finished.iter().any(|done| Arc::ptr_eq(done, handle)));
        }
    }

    /// Muxes `frames` once each of them has an encode result.
    pub fn get_frame_cached_result(&self, frames: Vec<Arc<FrameRecord>>, timestamp: u64, rotation: i32) {
        let (done, pending): (Vec<_>, Vec<_>) = frames.into_iter().partition(|frame| frame.is_finish_cache());
        let pending_ids: HashSet<u64> = pending.iter().map(|frame| frame.id()).collect();
        info!("clip of shutter {}: {} frames encoded, {} pending", timestamp, done.len(), pending_ids.len());

        let task_manager = self.task_manager.clone();
        let handle = CachedFrameCallbackHandle::new(
            pending_ids,
            done,
            Box::new(move |frames| task_manager.do_muxer_video(frames, timestamp, rotation)),
        );
        if handle.finish_if_settled() {
            return;
        }

        self.handles().push(handle.clone());
        // Encodes that completed between the partition and the registration.
        for frame in pending {
            let settled = match frame.status() {
                FrameStatus::FinishCache => handle.on_cache_frame_finish(&frame, true),
                FrameStatus::Idle => handle.on_cache_frame_finish(&frame, false),
                FrameStatus::Encoding => false,
            };
            if settled {
                self.handles().retain(|h| !Arc::ptr_eq(h, &handle));
                break;
            }
        }
    }

    pub fn clear_cache(&self) {
        let handles = std::mem::take(&mut *self.handles());
        debug!("abort {} clip requests", handles.len());
        for handle in handles {
            handle.abort();
        }
    }
}
