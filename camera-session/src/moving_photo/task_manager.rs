use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        mpsc::{self, Sender},
        Arc, Condvar, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use camera_core::{error::Error, Result};
use log::{debug, error, info, warn};

use super::frame::{FrameRecord, FrameStatus};

/// Encoding backend of moving-photo clips.
pub trait MovingPhotoEncoder: Send + Sync {
    /// Encodes one cached frame. The encoder may store its output with
    /// `FrameRecord::set_encoded_buffer`.
    fn encode_frame(&self, frame: &FrameRecord) -> bool;

    /// Muxes the encoded frames of one clip, already ordered by timestamp.
    fn mux_video(&self, frames: &[Arc<FrameRecord>], timestamp: u64, rotation: i32) -> Result<()>;

    fn start_audio_capture(&self) -> bool {
        true
    }

    fn stop_audio_capture(&self) {}
}

/// Encoder that accepts every frame and drops the clip.
#[derive(Default)]
pub struct DiscardEncoder;

impl MovingPhotoEncoder for DiscardEncoder {
    fn encode_frame(&self, _frame: &FrameRecord) -> bool {
        true
    }

    fn mux_video(&self, frames: &[Arc<FrameRecord>], timestamp: u64, _rotation: i32) -> Result<()> {
        debug!("discard clip of shutter {} with {} frames", timestamp, frames.len());
        Ok(())
    }
}

// Called with false when the task was queued before a stop.
type Task = Box<dyn FnOnce(bool) + Send>;

enum TaskCmd {
    Run(u64, Task),
    Shutdown,
}

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Single worker thread running encode and mux jobs in submission order.
pub struct TaskManager {
    encoder: Arc<dyn MovingPhotoEncoder>,
    sender: Mutex<Option<Sender<TaskCmd>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
    pending: Arc<Pending>,
    muxed: AtomicUsize,
}

impl TaskManager {
    pub fn new(encoder: Arc<dyn MovingPhotoEncoder>) -> Result<Arc<Self>> {
        let (sender, receiver) = mpsc::channel::<TaskCmd>();
        let generation = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(Pending::default());

        let worker_generation = generation.clone();
        let worker_pending = pending.clone();
        let handle = thread::Builder::new()
            .name("moving-photo-task".into())
            .spawn(move || {
                while let Ok(cmd) = receiver.recv() {
                    match cmd {
                        TaskCmd::Run(generation, task) => {
                            let is_current = generation == worker_generation.load(Ordering::Acquire);
                            if !is_current {
                                debug!("skip task of stopped generation {}", generation);
                            }
                            task(is_current);
                            worker_pending.done();
                        }
                        TaskCmd::Shutdown => break,
                    }
                }
            })
            .map_err(|err| Error::AllocationFailed(format!("failed to spawn task thread: {}", err).into()))?;

        Ok(Arc::new(Self {
            encoder,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            generation,
            pending,
            muxed: AtomicUsize::new(0),
        }))
    }

    pub fn encoder(&self) -> &Arc<dyn MovingPhotoEncoder> {
        &self.encoder
    }

    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.send(Box::new(move |is_current| {
            if is_current {
                task();
            }
        }))
    }

    fn send(&self, task: Task) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            warn!("task manager is shut down");
            return false;
        };
        self.pending.add();
        if sender.send(TaskCmd::Run(self.generation.load(Ordering::Acquire), task)).is_err() {
            self.pending.done();
            error!("task thread is gone");
            return false;
        }
        true
    }

    /// Encodes `frame` on the worker and reports the outcome to `done`. An
    /// encode dropped by `stop` reports a failure and leaves the frame idle.
    pub fn encode_video_buffer(&self, frame: Arc<FrameRecord>, done: impl FnOnce(Arc<FrameRecord>, bool) + Send + 'static) -> bool {
        let encoder = self.encoder.clone();
        self.send(Box::new(move |is_current| {
            if !is_current {
                frame.set_status(FrameStatus::Idle);
                done(frame, false);
                return;
            }
            let encoded = encoder.encode_frame(&frame);
            frame.set_status(if encoded {
                FrameStatus::FinishCache
            } else {
                FrameStatus::Idle
            });
            done(frame, encoded);
        }))
    }

    /// Muxes one clip. Runs on the calling thread, which is either the
    /// worker or the encode completion path.
    pub fn do_muxer_video(&self, mut frames: Vec<Arc<FrameRecord>>, timestamp: u64, rotation: i32) {
        frames.sort_by_key(|frame| frame.timestamp());
        info!("mux clip of shutter {}: {} frames, rotation {}", timestamp, frames.len(), rotation);
        match self.encoder.mux_video(&frames, timestamp, rotation) {
            Ok(()) => {
                self.muxed.fetch_add(1, Ordering::AcqRel);
            }
            Err(err) => error!("mux clip of shutter {} failed: {}", timestamp, err),
        }
    }

    /// Number of clips muxed successfully.
    pub fn muxed_count(&self) -> usize {
        self.muxed.load(Ordering::Acquire)
    }

    pub fn start_audio_capture(&self) -> bool {
        self.encoder.start_audio_capture()
    }

    pub fn stop_audio_capture(&self) {
        self.encoder.stop_audio_capture()
    }

    /// Drops every task queued so far. Dropped encodes still report to their
    /// completion. Tasks submitted afterwards run normally.
    pub fn stop(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("task manager stopped at generation {}", generation);
    }

    pub fn pending_tasks(&self) -> usize {
        *self.pending.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the queue drains or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.pending.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self.pending.idle.wait_timeout_while(count, timeout, |count| *count > 0).unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take() {
            sender.send(TaskCmd::Shutdown).ok();
        }
        if let Some(handle) = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("task thread panicked");
            }
        }
    }
}
