use std::sync::{atomic::Ordering, Arc, PoisonError, Weak};

use camera_core::{
    buffer::Surface,
    error::Error,
    invalid_arg_error, invalid_state_error,
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    not_allowed_error, session_config_error,
    stream::{OperationMode, RepeatStreamType, StreamType, STREAM_ID_UNSET},
    unknown_error, Result,
};
use camera_device::{CameraDevice, StreamOperatorCallback};
use log::{debug, error, info, warn};

use super::CaptureSession;
use crate::{
    moving_photo::{MovingPhotoListener, MovingPhotoVideoCache, TaskManager},
    state_machine::{CaptureSessionState, StateTransition},
    stream::{Stream, StreamRepeat},
};

fn is_valid_mode(op_mode: OperationMode, ability: &CameraMetadata) -> bool {
    if matches!(op_mode, OperationMode::Normal | OperationMode::Capture) {
        return true;
    }
    let mode = i32::from(op_mode);
    match ability.find(MetadataTag::AbilityCameraModes) {
        Some(MetadataValue::Byte(modes)) => modes.iter().any(|m| *m as i32 == mode),
        Some(MetadataValue::Int32(modes)) => modes.contains(&mode),
        Some(MetadataValue::UInt32(modes)) => modes.iter().any(|m| *m as i32 == mode),
        _ => false,
    }
}

fn require_config_in_progress(transition: &StateTransition<'_>, operation: &str) -> Result<()> {
    if transition.current() != CaptureSessionState::ConfigInProgress {
        error!("{} needs begin_config first, state {}", operation, transition.current());
        return Err(Error::InvalidState(format!("{} in state {}", operation, transition.current()).into()));
    }
    Ok(())
}

impl CaptureSession {
    pub fn begin_config(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            let state = transition.current();
            if !transition.transfer(CaptureSessionState::ConfigInProgress) {
                error!("begin_config in invalid state {}", state);
                return Err(invalid_state_error!(format!("begin_config in state {}", state)));
            }
            self.unlink_input_and_outputs();
            self.clear_sketch_repeat_streams();
            self.clear_moving_photo_repeat_stream();
            info!("session {} begin config", self.session_id);
            Ok(())
        })
    }

    pub fn can_add_input(&self) -> Result<bool> {
        self.state_machine.state_guard(|transition| {
            require_config_in_progress(transition, "can_add_input")?;
            if self.device().is_some() {
                return Err(session_config_error!("only one input is supported"));
            }
            Ok(true)
        })
    }

    pub fn add_input(&self, device: Arc<dyn CameraDevice>) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            require_config_in_progress(transition, "add_input")?;
            if self.device().is_some() {
                error!("session {} already has an input", self.session_id);
                return Err(session_config_error!("only one input is supported"));
            }
            info!("session {} add input: device {}", self.session_id, device.id());
            let callback: Weak<dyn StreamOperatorCallback> = self.weak_self.clone();
            device.set_stream_operator_callback(Some(callback));
            self.set_device(Some(device.clone()));
            if let Err(err) = device.dispatch_default_settings() {
                warn!("dispatch default settings failed: {}", err);
            }
            Ok(())
        })
    }

    pub fn remove_input(&self, device: &Arc<dyn CameraDevice>) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            require_config_in_progress(transition, "remove_input")?;
            match self.device() {
                Some(current) if Arc::ptr_eq(&current, device) => {
                    info!("session {} remove input: device {}", self.session_id, current.id());
                    if let Err(err) = current.reset_device_settings() {
                        warn!("reset device settings failed: {}", err);
                    }
                    current.set_stream_operator_callback(None);
                    self.set_device(None);
                    Ok(())
                }
                _ => {
                    error!("session {} remove input: device {} is not bound", self.session_id, device.id());
                    Err(session_config_error!("invalid camera device"))
                }
            }
        })
    }

    pub fn add_output(&self, stream: Stream) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            require_config_in_progress(transition, "add_output")?;
            if let Stream::Repeat(repeat) = &stream {
                if self.rotation_enabled.load(Ordering::Acquire) && repeat.repeat_type() == RepeatStreamType::Preview {
                    self.rotation_listener.add_preview_stream(repeat);
                }
            }
            self.add_output_stream(stream)
        })
    }

    pub fn remove_output(&self, stream: &Stream) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            require_config_in_progress(transition, "remove_output")?;
            if let Stream::Repeat(repeat) = stream {
                if self.rotation_enabled.load(Ordering::Acquire) && repeat.repeat_type() == RepeatStreamType::Preview {
                    self.rotation_listener.remove_preview_stream(repeat);
                }
            }
            self.remove_output_stream(stream)
        })
    }

    fn add_output_stream(&self, stream: Stream) -> Result<()> {
        debug!("add output stream: type {} id {}", stream.stream_type(), stream.fwk_stream_id());
        if stream.fwk_stream_id() == STREAM_ID_UNSET && stream.stream_type() != StreamType::Metadata {
            error!("add output stream: stream is released");
            return Err(invalid_arg_error!("stream is released"));
        }
        if !self.streams.add_stream(stream.clone()) {
            return Err(session_config_error!("stream is already added"));
        }
        match &stream {
            Stream::Capture(capture) => {
                capture.set_mode(self.op_mode);
                capture.common().set_color_space(self.capture_color_space());
            }
            _ => stream.set_color_space(self.active_color_space()),
        }
        Ok(())
    }

    fn remove_output_stream(&self, stream: &Stream) -> Result<()> {
        debug!("remove output stream: type {} id {}", stream.stream_type(), stream.fwk_stream_id());
        if !self.streams.remove_stream(stream) {
            return Err(session_config_error!("invalid output"));
        }
        Ok(())
    }

    pub fn commit_config(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            if !transition.check_transfer(CaptureSessionState::ConfigCommitted) {
                error!("commit_config needs begin_config first, state {}", transition.current());
                return Err(invalid_state_error!(format!("commit_config in state {}", transition.current())));
            }
            let Some(device) = self.device() else {
                error!("session {} commit: no inputs present", self.session_id);
                return Err(session_config_error!("no inputs present"));
            };
            if self.streams.is_empty() {
                error!("session {} commit: no outputs present", self.session_id);
                return Err(session_config_error!("no outputs present"));
            }

            self.expand_moving_photo_repeat_stream(&device)?;
            self.expand_sketch_repeat_streams();

            let secure_seq = device.secure_camera_seq()?;
            if self.op_mode.is_secure() != (secure_seq != 0) {
                error!("secure camera mismatch: mode {}, secure seq {}", self.op_mode, secure_seq);
                return Err(not_allowed_error!("secure camera is not allowed for this mode"));
            }

            if let Err(err) = self.link_input_and_outputs(&device) {
                error!("session {} commit failed: {}", self.session_id, err);
                for stream in self.streams.get_all_streams() {
                    if let Err(err) = stream.unlink_input() {
                        debug!("unlink stream {} failed: {}", stream.fwk_stream_id(), err);
                    }
                }
                device.reset_hdi_stream_id();
                return Err(err);
            }
            transition.transfer(CaptureSessionState::ConfigCommitted);
            info!("session {} committed {} streams", self.session_id, self.streams.size());
            Ok(())
        })
    }

    fn link_input_and_outputs(&self, device: &Arc<dyn CameraDevice>) -> Result<()> {
        let ability = device.device_ability().ok_or_else(|| unknown_error!("device ability is missing"))?;
        let operator = device.stream_operator().ok_or_else(|| session_config_error!("stream operator is missing"))?;
        if !is_valid_mode(self.op_mode, &ability) {
            return Err(Error::InvalidSessionConfig(format!("mode {} is not supported", self.op_mode).into()));
        }

        let mut infos = Vec::new();
        for stream in self.streams.get_all_streams() {
            stream.link_input(operator.clone(), ability.clone())?;
            stream.set_hdi_stream_id(device.generate_hdi_stream_id());
            debug!("link stream: type {} fwk id {} hdi id {}", stream.stream_type(), stream.fwk_stream_id(), stream.hdi_stream_id());
            if stream.stream_type() != StreamType::Metadata {
                infos.push(stream.stream_info());
            }
        }
        device.create_and_commit_streams(&infos, &ability, self.op_mode)
    }

    fn unlink_input_and_outputs(&self) {
        let mut hdi_stream_ids = Vec::new();
        for stream in self.streams.get_all_streams() {
            let hdi_stream_id = stream.hdi_stream_id();
            if hdi_stream_id != STREAM_ID_UNSET {
                hdi_stream_ids.push(hdi_stream_id);
            }
            if let Err(err) = stream.unlink_input() {
                warn!("unlink stream {} failed: {}", stream.fwk_stream_id(), err);
            }
        }
        debug!("unlink input and outputs: hdi ids {:?}", hdi_stream_ids);

        if let Some(device) = self.device() {
            if !hdi_stream_ids.is_empty() {
                if let Err(err) = device.release_streams(&hdi_stream_ids) {
                    warn!("release streams failed: {}", err);
                }
            }
            if let Err(err) = device.update_streams(&[]) {
                warn!("update streams failed: {}", err);
            }
            device.reset_hdi_stream_id();
        }
    }

    fn expand_sketch_repeat_streams(&self) {
        for stream in self.streams.get_streams(StreamType::Repeat) {
            let Some(repeat) = stream.as_repeat() else {
                continue;
            };
            if repeat.repeat_type() == RepeatStreamType::Sketch {
                continue;
            }
            if let Some(sketch) = repeat.sketch_stream() {
                if self.streams.get_stream(sketch.common().fwk_stream_id()).is_none() {
                    if let Err(err) = self.add_output_stream(sketch.into()) {
                        warn!("expand sketch stream failed: {}", err);
                    }
                }
            }
        }
    }

    fn clear_sketch_repeat_streams(&self) {
        for stream in self.streams.get_streams(StreamType::Repeat) {
            if stream.as_repeat().map(|repeat| repeat.repeat_type()) == Some(RepeatStreamType::Sketch) {
                debug!("clear sketch stream {}", stream.fwk_stream_id());
                self.streams.remove_stream(&stream);
            }
        }
    }

    fn live_photo_stream(&self) -> Option<Arc<StreamRepeat>> {
        self.streams
            .get_streams(StreamType::Repeat)
            .into_iter()
            .filter_map(|stream| stream.as_repeat().cloned())
            .find(|repeat| repeat.repeat_type() == RepeatStreamType::LivePhoto)
    }

    fn expand_moving_photo_repeat_stream(&self, device: &Arc<dyn CameraDevice>) -> Result<()> {
        if !device.check_moving_photo_supported(self.op_mode) {
            debug!("moving photo is not supported in mode {}", self.op_mode);
            return Ok(());
        }
        if self.live_photo_stream().is_some() {
            return Ok(());
        }
        let preview = self
            .streams
            .get_streams(StreamType::Repeat)
            .into_iter()
            .filter_map(|stream| stream.as_repeat().cloned())
            .find(|repeat| repeat.repeat_type() == RepeatStreamType::Preview);
        let Some(preview) = preview else {
            return Ok(());
        };

        let (format, width, height) = (preview.common().format(), preview.common().width(), preview.common().height());
        if width == 0 || height == 0 {
            return Err(invalid_arg_error!("moving photo stream size is empty"));
        }

        let mut context = self.moving_photo_context();
        if context.task_manager.is_none() {
            let encoder = self.encoder.read().unwrap_or_else(PoisonError::into_inner).clone();
            context.task_manager = Some(TaskManager::new(encoder)?);
        }
        if context.video_cache.is_none() {
            context.video_cache = context.task_manager.clone().map(MovingPhotoVideoCache::new);
        }

        let surface = Surface::new("moving-photo", width, height, format);
        let listener = MovingPhotoListener::new(surface.clone(), self.config.cache_frame_count);
        let consumer = Arc::downgrade(&listener);
        surface.set_listener(consumer);
        let live_photo = StreamRepeat::new(Some(surface.clone()), format, width, height, RepeatStreamType::LivePhoto);
        live_photo.set_mirror(self.is_moving_photo_mirror.load(Ordering::Acquire));
        context.surface = Some(surface);
        context.listener = Some(listener);
        drop(context);

        info!("expand moving photo stream {}: {}x{} {}", live_photo.common().fwk_stream_id(), width, height, format);
        self.add_output_stream(live_photo.into())
    }

    fn clear_moving_photo_repeat_stream(&self) {
        let Some(live_photo) = self.live_photo_stream() else {
            return;
        };
        self.stop_moving_photo();
        let context = std::mem::take(&mut *self.moving_photo_context());
        if let Some(surface) = context.surface {
            surface.clear_listener();
        }
        if let Some(listener) = context.listener {
            listener.clear_cache();
        }
        debug!("clear moving photo stream {}", live_photo.common().fwk_stream_id());
        self.streams.remove_stream(&Stream::from(live_photo));
    }
}
