use std::sync::{atomic::Ordering, PoisonError};

use camera_core::{
    invalid_state_error,
    metadata::{CameraMetadata, MetadataTag, MetadataValue, MuteMode},
    stream::{RepeatStreamType, StreamType, STREAM_ID_UNSET},
    Result,
};
use log::{error, info, warn};

use super::CaptureSession;
use crate::{registry::SessionRegistry, state_machine::CaptureSessionState, stream::Stream};

fn keep_first_error(first: &mut Result<()>, result: Result<()>) {
    if first.is_ok() {
        *first = result;
    }
}

impl CaptureSession {
    /// Settings a start request carries: the device's cached settings with
    /// the mute mode overlaid.
    fn start_settings(&self) -> CameraMetadata {
        let Some(device) = self.device() else {
            return CameraMetadata::new();
        };
        let mut settings = device.clone_cached_settings();
        let mute_mode = if device.is_muted() {
            MuteMode::SolidColorBlack
        } else {
            MuteMode::Off
        };
        settings.add_entry(MetadataTag::ControlMuteMode, MetadataValue::Byte(vec![mute_mode.into()]));
        settings
    }

    /// Starts every preview, then the live-photo stream. The session moves to
    /// `Started` even when a stream fails to start; the first failure is
    /// still returned.
    pub fn start(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            if !transition.check_transfer(CaptureSessionState::Started) {
                error!("start needs a committed configuration, state {}", transition.current());
                return Err(invalid_state_error!(format!("start in state {}", transition.current())));
            }
            let settings = self.start_settings();
            let result = self.start_preview_streams(&settings);
            if let Err(err) = &result {
                error!("session {} start failed: {}", self.session_id, err);
            }
            transition.transfer(CaptureSessionState::Started);
            info!("session {} started", self.session_id);
            result
        })
    }

    fn start_preview_streams(&self, settings: &CameraMetadata) -> Result<()> {
        let repeat_streams: Vec<_> = self.streams.get_streams(StreamType::Repeat).iter().filter_map(|stream| stream.as_repeat().cloned()).collect();
        let is_set_motion_photo = self.is_set_motion_photo.load(Ordering::Acquire);
        let mut result = Ok(());
        let mut has_deferred_preview = false;

        for preview in repeat_streams.iter().filter(|repeat| repeat.repeat_type() == RepeatStreamType::Preview) {
            keep_first_error(&mut result, preview.start(settings));
            if !preview.has_producer() {
                has_deferred_preview = true;
                if is_set_motion_photo {
                    let session = self.weak_self.clone();
                    preview.set_deferred_surface_callback(Box::new(move || {
                        if let Some(session) = session.upgrade() {
                            info!("deferred surface attached, start moving photo stream");
                            if let Err(err) = session.start_moving_photo_stream() {
                                warn!("start moving photo stream failed: {}", err);
                            }
                        }
                    }));
                }
            }
        }

        if is_set_motion_photo && !has_deferred_preview {
            for live_photo in repeat_streams.iter().filter(|repeat| repeat.repeat_type() == RepeatStreamType::LivePhoto) {
                if let Err(err) = live_photo.start(settings) {
                    error!("start moving photo stream failed: {}", err);
                    break;
                }
                self.start_audio_capture();
            }
        }
        result
    }

    /// Stops every stream by type and returns to `ConfigCommitted`. Only a
    /// preview failure is reported.
    pub fn stop(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            if transition.current() != CaptureSessionState::Started {
                error!("stop needs a started session, state {}", transition.current());
                return Err(invalid_state_error!(format!("stop in state {}", transition.current())));
            }
            let mut result = Ok(());
            for stream in self.streams.get_all_streams() {
                let stopped = match &stream {
                    Stream::Repeat(repeat) => match repeat.repeat_type() {
                        RepeatStreamType::Preview => match repeat.stop() {
                            Err(err) => {
                                error!("stop preview {} failed: {}", stream.fwk_stream_id(), err);
                                keep_first_error(&mut result, Err(err));
                                Ok(())
                            }
                            stopped => stopped,
                        },
                        RepeatStreamType::LivePhoto => {
                            let stopped = repeat.stop();
                            self.stop_moving_photo();
                            stopped
                        }
                        _ => repeat.stop(),
                    },
                    Stream::Capture(capture) => capture.cancel_capture(),
                    Stream::Metadata(metadata) => metadata.stop(),
                    Stream::Depth(depth) => depth.stop(),
                };
                if let Err(err) = stopped {
                    error!("stop stream {} failed: {}", stream.fwk_stream_id(), err);
                }
            }
            transition.transfer(CaptureSessionState::ConfigCommitted);
            info!("session {} stopped", self.session_id);
            result
        })
    }

    /// Tears the session down. Every cleanup step runs even when an earlier
    /// one failed.
    pub fn release(&self) -> Result<()> {
        self.state_machine.state_guard(|transition| {
            if !transition.check_transfer(CaptureSessionState::Released) {
                error!("session {} is already released", self.session_id);
                return Err(invalid_state_error!("session is already released"));
            }
            info!("session {} release, pid {}", self.session_id, self.pid);

            self.stop_moving_photo();
            self.release_streams();

            if let Some(device) = self.device.write().unwrap_or_else(PoisonError::into_inner).take() {
                device.set_stream_operator_callback(None);
                if let Err(err) = device.release() {
                    warn!("release device {} failed: {}", device.id(), err);
                }
            }

            SessionRegistry::instance().erase(self.pid, &self.weak_self);
            self.unset_callback();
            self.rotation_listener.clear();
            transition.transfer(CaptureSessionState::Released);

            let context = std::mem::take(&mut *self.moving_photo_context());
            if let Some(surface) = context.surface {
                surface.clear_listener();
            }
            if let Some(listener) = context.listener {
                listener.clear_cache();
            }
            Ok(())
        })
    }

    fn release_streams(&self) {
        let mut hdi_stream_ids = Vec::new();
        for stream in self.streams.get_all_streams() {
            let hdi_stream_id = stream.hdi_stream_id();
            if hdi_stream_id != STREAM_ID_UNSET {
                hdi_stream_ids.push(hdi_stream_id);
            }
            if let Err(err) = stream.release_stream(true) {
                warn!("release stream {} failed: {}", stream.fwk_stream_id(), err);
            }
        }
        self.streams.clear();
        hdi_stream_ids.sort_unstable();
        hdi_stream_ids.dedup();
        info!("release streams: hdi ids {:?}", hdi_stream_ids);

        if let Some(device) = self.device() {
            if !hdi_stream_ids.is_empty() {
                if let Err(err) = device.release_streams(&hdi_stream_ids) {
                    warn!("release streams on device failed: {}", err);
                }
            }
        }
    }
}
