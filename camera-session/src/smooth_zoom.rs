//! Smooth zoom trajectories.
//!
//! Zoom values are in hundredths (a ratio of 2.0 is 200), matching what the
//! device reports in `StatusCurrentZoomRatio`.

use camera_core::{
    metadata::{CameraMetadata, MetadataTag},
    stream::OperationMode,
    unknown_error, Result,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

pub const ZOOM_RATIO_MULTIPLE: f32 = 100.0;
pub const DEFAULT_FPS: f32 = 30.0;
pub const DEFAULT_ZOOM_RATIO: f32 = 100.0;

const BASE_DURATION_MS: f32 = 300.0;
const DURATION_SLOPE_MS: f32 = 150.0;
const MAX_DURATION_MS: f32 = 1000.0;

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum SmoothZoomType {
    #[default]
    Normal = 0,
    Linear,
}

impl SmoothZoomType {
    /// The interpolation curve of this type. The device may override the
    /// control points of the normal curve with `AbilityZoomBezierCurve`.
    pub fn curve(&self, ability: Option<&CameraMetadata>) -> Box<dyn ZoomCurve> {
        match self {
            SmoothZoomType::Normal => {
                let points = ability.and_then(|ability| ability.find_f32_array(MetadataTag::AbilityZoomBezierCurve));
                match points {
                    Some(&[x1, y1, x2, y2]) => Box::new(CubicBezierCurve::new(x1, y1, x2, y2)),
                    _ => Box::new(CubicBezierCurve::default()),
                }
            }
            SmoothZoomType::Linear => Box::new(LinearCurve),
        }
    }
}

/// Animation length of a zoom from `current` to `target`, longer for larger
/// ratio changes.
pub fn zoom_duration_ms(current: f32, target: f32) -> f32 {
    let ratio = (target / current).abs().log2().abs();
    (BASE_DURATION_MS + DURATION_SLOPE_MS * ratio).min(MAX_DURATION_MS)
}

pub trait ZoomCurve: Send + Sync {
    /// Progress in `[0, 1]` for normalized time `t` in `[0, 1]`.
    fn progress(&self, t: f32) -> f32;

    /// One zoom sample per frame from the first frame after `current` up to
    /// `target` inclusive. Empty for non-positive inputs.
    fn zoom_array(&self, current: f32, target: f32, frame_interval_ms: f32) -> Vec<f32> {
        if !(current > 0.0 && target > 0.0 && frame_interval_ms > 0.0) {
            return Vec::new();
        }
        let frames = (zoom_duration_ms(current, target) / frame_interval_ms).ceil().max(1.0) as usize;
        (1..=frames)
            .map(|i| {
                if i == frames {
                    target
                } else {
                    current + (target - current) * self.progress(i as f32 / frames as f32)
                }
            })
            .collect()
    }
}

/// CSS-style cubic Bezier easing through (0, 0), (x1, y1), (x2, y2), (1, 1).
#[derive(Clone, Copy, Debug)]
pub struct CubicBezierCurve {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Default for CubicBezierCurve {
    fn default() -> Self {
        Self::new(0.2, 0.0, 0.2, 1.0)
    }
}

impl CubicBezierCurve {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.clamp(0.0, 1.0),
            y1,
            x2: x2.clamp(0.0, 1.0),
            y2,
        }
    }

    fn bezier(p1: f32, p2: f32, s: f32) -> f32 {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    }
}

impl ZoomCurve for CubicBezierCurve {
    fn progress(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        // x(s) is monotonic for control abscissae in [0, 1]
        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        for _ in 0..32 {
            let mid = (lo + hi) / 2.0;
            if Self::bezier(self.x1, self.x2, mid) < t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Self::bezier(self.y1, self.y2, (lo + hi) / 2.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearCurve;

impl ZoomCurve for LinearCurve {
    fn progress(&self, t: f32) -> f32 {
        t.clamp(0.0, 1.0)
    }
}

/// A zoom level at which the device switches lenses, with the settle time
/// needed when crossing it upwards or downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomPointInfo {
    pub zoom_ratio: f32,
    pub wait_up: f32,
    pub wait_down: f32,
}

/// Extracts the cross points of `mode` from `AbilityZoomPerformance` records
/// laid out as `[mode, count, count * (zoom, wait_up, wait_down)]`.
pub fn parse_zoom_performance(data: &[u32], mode: OperationMode) -> Vec<ZoomPointInfo> {
    let mode = i32::from(mode) as u32;
    let mut i = 0;
    while i + 1 < data.len() {
        let (scene_mode, count) = (data[i], data[i + 1] as usize);
        let end = (i + 2 + count * 3).min(data.len());
        if scene_mode == mode {
            return data[i + 2..end]
                .chunks_exact(3)
                .map(|point| ZoomPointInfo {
                    zoom_ratio: point[0] as f32,
                    wait_up: point[1] as f32,
                    wait_down: point[2] as f32,
                })
                .collect();
        }
        i = end;
    }
    Vec::new()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmoothZoomPlan {
    /// (zoom, time offset in ms) per frame.
    pub points: Vec<(u32, u32)>,
    pub duration_ms: f32,
}

impl SmoothZoomPlan {
    /// Flattened `[zoom, time, zoom, time, ...]` layout of `ControlSmoothZoomRatios`.
    pub fn to_ratios(&self) -> Vec<u32> {
        self.points.iter().flat_map(|(zoom, time)| [*zoom, *time]).collect()
    }
}

/// Builds the zoom trajectory from `current` to `target`, both in hundredths.
pub fn plan_smooth_zoom(curve: &dyn ZoomCurve, current: f32, target: f32, fps: f32, cross_points: &[ZoomPointInfo]) -> Result<SmoothZoomPlan> {
    let fps = if fps > 0.0 { fps } else { DEFAULT_FPS };
    let frame_interval = 1000.0 / fps;
    let array = curve.zoom_array(current, target, frame_interval);
    if array.is_empty() {
        return Err(unknown_error!("smooth zoom array is empty"));
    }

    let zoom_in = target > current;
    let mut wait_time = 0.0f32;
    for point in cross_points {
        let cross = point.zoom_ratio;
        if (cross - current) * (cross - target) > 0.0 {
            continue;
        }
        let wait_ms = if zoom_in { point.wait_up } else { point.wait_down };
        // Offsets truncate toward zero, a sample within one unit of the cross
        // point is not past it.
        let first = (array[0] - cross).trunc();
        if let Some(j) = array.iter().position(|zoom| (*zoom - cross).trunc() * first < 0.0) {
            wait_time = wait_time.max(wait_ms - frame_interval * j as f32);
        }
    }

    let points = array.iter().enumerate().map(|(i, zoom)| (*zoom as u32, (i as f32 * frame_interval + wait_time) as u32)).collect();
    Ok(SmoothZoomPlan {
        points,
        duration_ms: (array.len() - 1) as f32 * frame_interval + wait_time,
    })
}
