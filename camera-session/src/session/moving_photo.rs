use std::sync::{atomic::Ordering, Arc};

use camera_core::{
    error::ServiceErrorCode,
    metadata::CameraMetadata,
    invalid_state_error,
    stream::{RepeatStreamType, StreamType, CAPTURE_ID_UNSET},
    Result,
};
use log::{debug, info, warn};

use super::CaptureSession;
use crate::{
    moving_photo::{MovingPhotoListener, SessionDrainImageCallback, TaskManager},
    state_machine::CaptureSessionState,
    stream::StreamRepeat,
};

impl CaptureSession {
    fn repeat_streams_of(&self, repeat_type: RepeatStreamType) -> Vec<Arc<StreamRepeat>> {
        self.streams
            .get_streams(StreamType::Repeat)
            .into_iter()
            .filter_map(|stream| stream.as_repeat().cloned())
            .filter(|repeat| repeat.repeat_type() == repeat_type)
            .collect()
    }

    pub fn is_moving_photo_enabled(&self) -> bool {
        self.is_set_motion_photo.load(Ordering::Acquire)
    }

    pub fn is_moving_photo_mirror(&self) -> bool {
        self.is_moving_photo_mirror.load(Ordering::Acquire)
    }

    /// Enables or disables moving photo. A started session applies the change
    /// to the live-photo stream right away, otherwise it takes effect at the
    /// next start.
    pub fn enable_moving_photo(&self, enable: bool) -> Result<()> {
        self.is_set_motion_photo.store(enable, Ordering::Release);
        info!("session {} moving photo {}", self.session_id, if enable { "enabled" } else { "disabled" });
        match self.start_moving_photo_stream() {
            Err(err) if err.code() == ServiceErrorCode::InvalidState => {
                debug!("moving photo change deferred: {}", err);
                Ok(())
            }
            result => result,
        }
    }

    /// Sets the mirror flag the live-photo stream is created and started with.
    pub fn enable_moving_photo_mirror(&self, is_mirror: bool) {
        self.is_moving_photo_mirror.store(is_mirror, Ordering::Release);
        for live_photo in self.repeat_streams_of(RepeatStreamType::LivePhoto) {
            live_photo.set_mirror(is_mirror);
        }
    }

    /// Starts or stops the live-photo stream to match the moving-photo flag.
    /// Needs a started session with a streaming preview.
    pub fn start_moving_photo_stream(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            if transition.current() != CaptureSessionState::Started {
                return Err(invalid_state_error!(format!("moving photo stream in state {}", transition.current())));
            }
            let preview_started = self
                .repeat_streams_of(RepeatStreamType::Preview)
                .iter()
                .any(|preview| preview.common().prepared_capture_id() != CAPTURE_ID_UNSET && preview.has_producer());
            if !preview_started {
                warn!("moving photo stream: preview is not streaming");
                return Ok(());
            }

            let Some(live_photo) = self.repeat_streams_of(RepeatStreamType::LivePhoto).into_iter().next() else {
                return Ok(());
            };
            if self.is_moving_photo_enabled() {
                live_photo.start(&self.cached_settings())?;
                self.start_audio_capture();
                Ok(())
            } else {
                let result = live_photo.stop();
                self.stop_moving_photo();
                result
            }
        })
    }

    fn cached_settings(&self) -> CameraMetadata {
        self.device().map(|device| device.clone_cached_settings()).unwrap_or_default()
    }

    /// Restarts the live-photo stream when a capture asks for a different
    /// mirror setting. Cached frames of the old setting are dropped.
    pub fn start_moving_photo_capture(&self, is_mirror: bool) -> Result<()> {
        if !self.is_moving_photo_enabled() || is_mirror == self.is_moving_photo_mirror() {
            return Ok(());
        }
        let mut result = Ok(());
        if let Some(live_photo) = self.repeat_streams_of(RepeatStreamType::LivePhoto).into_iter().next() {
            info!("restart moving photo stream, mirror {}", is_mirror);
            live_photo.set_mirror(is_mirror);
            if let Err(err) = live_photo.stop() {
                warn!("stop moving photo stream failed: {}", err);
            }
            result = live_photo.start(&self.cached_settings());
        }
        self.is_moving_photo_mirror.store(is_mirror, Ordering::Release);
        let listener = self.moving_photo_context().listener.clone();
        if let Some(listener) = listener {
            listener.clear_cache();
        }
        result
    }

    pub(super) fn start_audio_capture(&self) {
        let task_manager = self.moving_photo_context().task_manager.clone();
        if let Some(task_manager) = task_manager {
            if !task_manager.start_audio_capture() {
                warn!("start audio capture failed");
            }
        }
    }

    /// Finalizes outstanding drains, aborts pending clips and drops queued
    /// encode work.
    pub(super) fn stop_moving_photo(&self) {
        let (listener, video_cache, task_manager) = {
            let context = self.moving_photo_context();
            (context.listener.clone(), context.video_cache.clone(), context.task_manager.clone())
        };
        if let Some(listener) = listener {
            listener.stop_drain_out();
        }
        if let Some(video_cache) = video_cache {
            video_cache.clear_cache();
        }
        if let Some(task_manager) = task_manager {
            task_manager.stop_audio_capture();
            task_manager.stop();
        }
    }

    /// Starts encoding the clip around the shutter at `timestamp`.
    pub(super) fn start_moving_photo_encode(&self, rotation: i32, timestamp: u64) {
        if !self.is_moving_photo_enabled() {
            return;
        }
        let sensor_orientation = self.device().map(|device| device.sensor_orientation()).unwrap_or(0);
        self.start_record(timestamp, (sensor_orientation + rotation).rem_euclid(360));
    }

    fn start_record(&self, timestamp: u64, rotation: i32) {
        let (listener, video_cache, task_manager) = {
            let context = self.moving_photo_context();
            (context.listener.clone(), context.video_cache.clone(), context.task_manager.clone())
        };
        let (Some(listener), Some(video_cache), Some(task_manager)) = (listener, video_cache, task_manager) else {
            debug!("moving photo pipeline is not ready");
            return;
        };
        info!("start record: shutter {} rotation {}", timestamp, rotation);
        task_manager.submit(move || {
            let callback = SessionDrainImageCallback::new(Arc::downgrade(&listener), video_cache, timestamp, rotation);
            listener.drain_out_image(callback);
        });
    }

    pub fn moving_photo_listener(&self) -> Option<Arc<MovingPhotoListener>> {
        self.moving_photo_context().listener.clone()
    }

    pub fn moving_photo_task_manager(&self) -> Option<Arc<TaskManager>> {
        self.moving_photo_context().task_manager.clone()
    }
}
