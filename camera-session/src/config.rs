use camera_core::{stream::ColorSpace, variant::Variant};

pub const DEFAULT_CACHE_FRAME_COUNT: usize = 45;

const OPTION_KEYS: &[&str] = &["multi_camera_enabled", "cache_frame_count", "fallback_color_space"];

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Allow one process to hold several sessions at once. When disabled a new
    /// session preempts the process's previous one.
    pub multi_camera_enabled: bool,
    /// Capacity of the moving-photo frame cache, also the drain look-ahead.
    pub cache_frame_count: usize,
    /// Color space used when a best-effort color space change is rejected.
    pub fallback_color_space: ColorSpace,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            multi_camera_enabled: false,
            cache_frame_count: DEFAULT_CACHE_FRAME_COUNT,
            fallback_color_space: ColorSpace::BT709,
        }
    }
}

impl SessionConfig {
    pub fn from_options(options: &Variant) -> Self {
        let mut config = Self::default();
        for key in OPTION_KEYS {
            config.update_with_option(key, &options[*key]);
        }
        config
    }

    pub fn update_with_option(&mut self, key: &str, value: &Variant) {
        match key {
            "multi_camera_enabled" => {
                if let Some(enabled) = value.get_bool() {
                    self.multi_camera_enabled = enabled;
                }
            }
            "cache_frame_count" => {
                if let Some(count) = value.get_uint32().filter(|count| *count > 0) {
                    self.cache_frame_count = count as usize;
                }
            }
            "fallback_color_space" => {
                if let Some(color_space) = value.get_int32().and_then(|v| ColorSpace::try_from(v).ok()) {
                    self.fallback_color_space = color_space;
                }
            }
            _ => {}
        }
    }
}
