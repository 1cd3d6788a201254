use std::sync::PoisonError;

use camera_core::{
    invalid_state_error,
    metadata::{CameraMetadata, MetadataTag, MetadataValue},
    not_allowed_error,
    stream::{ColorSpace, OperationMode, StreamType},
    unknown_error, Result,
};
use log::{debug, error, info, warn};

use super::CaptureSession;
use crate::{
    smooth_zoom::{parse_zoom_performance, plan_smooth_zoom, SmoothZoomType, DEFAULT_FPS, DEFAULT_ZOOM_RATIO, ZOOM_RATIO_MULTIPLE},
    state_machine::CaptureSessionState,
    stream::Stream,
};

impl CaptureSession {
    // HDR color spaces need every repeat stream in a 10-bit format.
    fn color_space_matches_format(&self, color_space: ColorSpace) -> bool {
        if !color_space.is_hdr() {
            return true;
        }
        self.streams.get_streams(StreamType::Repeat).iter().all(|stream| {
            let format = stream.common().format();
            if !format.is_10bit() {
                error!("stream {} format {} does not match color space {}", stream.fwk_stream_id(), format, color_space);
                return false;
            }
            true
        })
    }

    fn set_color_space_for_streams(&self) {
        let (color_space, capture_color_space) = (self.active_color_space(), self.capture_color_space());
        for stream in self.streams.get_all_streams() {
            match stream {
                Stream::Capture(_) => stream.set_color_space(capture_color_space),
                _ => stream.set_color_space(color_space),
            }
        }
    }

    /// Changes the session color spaces. With `is_need_update` a format
    /// mismatch is rejected and a committed session updates its streams on
    /// the device; without it a mismatch falls back to the configured
    /// fallback color space.
    pub fn set_color_space(&self, color_space: ColorSpace, capture_color_space: ColorSpace, is_need_update: bool) -> Result<()> {
        if color_space == self.active_color_space() && capture_color_space == self.capture_color_space() {
            debug!("color space is unchanged");
            return Ok(());
        }
        self.state_machine.state_guard(|transition| {
            let state = transition.current();
            if !matches!(state, CaptureSessionState::ConfigInProgress | CaptureSessionState::ConfigCommitted) {
                error!("set_color_space in invalid state {}", state);
                return Err(invalid_state_error!(format!("set_color_space in state {}", state)));
            }
            info!("set color space {}, capture color space {}, need update {}", color_space, capture_color_space, is_need_update);

            let mut color_space = color_space;
            if !self.color_space_matches_format(color_space) {
                if is_need_update {
                    return Err(not_allowed_error!("format and color space do not match"));
                }
                warn!("color space {} falls back to {}", color_space, self.config.fallback_color_space);
                color_space = self.config.fallback_color_space;
            }
            *self.color_space.write().unwrap_or_else(PoisonError::into_inner) = color_space;
            *self.capture_color_space.write().unwrap_or_else(PoisonError::into_inner) = capture_color_space;
            self.set_color_space_for_streams();

            if is_need_update && state == CaptureSessionState::ConfigCommitted {
                let device = self.device().ok_or_else(|| unknown_error!("camera device is missing"))?;
                device.update_streams(&self.current_stream_infos())?;
            }
            Ok(())
        })
    }

    fn query_fps_and_zoom_ratio(&self, device: &dyn camera_device::CameraDevice) -> (f32, f32) {
        match device.get_status(&[MetadataTag::StatusCurrentFps, MetadataTag::StatusCurrentZoomRatio]) {
            Ok(status) => {
                let fps = status.find_i32(MetadataTag::StatusCurrentFps).map(|fps| fps as f32).unwrap_or(DEFAULT_FPS);
                let zoom = status.find_i32(MetadataTag::StatusCurrentZoomRatio).map(|zoom| zoom as f32).unwrap_or(DEFAULT_ZOOM_RATIO);
                (fps, zoom)
            }
            Err(err) => {
                warn!("query fps and zoom ratio failed: {}", err);
                (DEFAULT_FPS, DEFAULT_ZOOM_RATIO)
            }
        }
    }

    /// Pushes a smooth zoom trajectory to `target_zoom_ratio` and returns its
    /// duration in milliseconds.
    pub fn set_smooth_zoom(&self, zoom_type: SmoothZoomType, op_mode: OperationMode, target_zoom_ratio: f32) -> Result<f32> {
        let device = self.device().ok_or_else(|| unknown_error!("camera device is missing"))?;
        let (fps, current) = self.query_fps_and_zoom_ratio(device.as_ref());
        let ability = device.device_ability();
        let cross_points = ability
            .as_ref()
            .and_then(|ability| ability.find_u32_array(MetadataTag::AbilityZoomPerformance))
            .map(|data| parse_zoom_performance(data, op_mode))
            .unwrap_or_default();

        let curve = zoom_type.curve(ability.as_deref());
        let plan = plan_smooth_zoom(curve.as_ref(), current, target_zoom_ratio * ZOOM_RATIO_MULTIPLE, fps, &cross_points)?;
        debug!("smooth zoom {} -> {}: {} points, duration {}", current, target_zoom_ratio, plan.points.len(), plan.duration_ms);

        let mut settings = CameraMetadata::new();
        settings.add_entry(MetadataTag::ControlSmoothZoomRatios, MetadataValue::UInt32(plan.to_ratios()));
        device.update_setting_once(&settings)?;
        Ok(plan.duration_ms)
    }
}
