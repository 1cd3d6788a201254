use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumCount, EnumIter};

use crate::{error::Error, invalid_param_error, Result};

pub type StreamId = i32;
pub type CaptureId = i32;

pub const STREAM_ID_UNSET: StreamId = 0;
pub const CAPTURE_ID_UNSET: CaptureId = 0;

#[derive(Clone, Copy, Debug, Display, EnumCount, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StreamType {
    Repeat = 0,
    Capture,
    Metadata,
    Depth,
}

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RepeatStreamType {
    Preview = 0,
    Video,
    Sketch,
    LivePhoto,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum StreamIntent {
    #[default]
    Preview = 0,
    Video,
    StillCapture,
    Postview,
    Analyze,
    Custom,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum PixelFormat {
    #[default]
    Unknown = 0,
    RGBA_8888 = 12,
    YCBCR_420_SP = 24, // biplanar YUV 4:2:0, 8 bits, UV
    YCRCB_420_SP,      // biplanar YUV 4:2:0, 8 bits, VU
    YCBCR_P010 = 35,   // biplanar YUV 4:2:0, 10 bits, UV
    YCRCB_P010,        // biplanar YUV 4:2:0, 10 bits, VU
    BLOB = 100,        // encoded still image
    DEPTH_16,          // 16 bits depth samples
}

impl PixelFormat {
    pub fn is_10bit(&self) -> bool {
        matches!(self, PixelFormat::YCBCR_P010 | PixelFormat::YCRCB_P010)
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ColorSpace {
    #[default]
    COLOR_SPACE_UNKNOWN = 0,
    DISPLAY_P3 = 3,
    SRGB = 4,
    BT709 = 6,
    BT2020_HLG = 9,
    BT2020_PQ = 10,
    P3_HLG = 11,
    P3_PQ = 12,
    DISPLAY_P3_LIMIT = 14,
    SRGB_LIMIT = 15,
    BT709_LIMIT = 16,
    BT2020_HLG_LIMIT = 19,
    BT2020_PQ_LIMIT = 20,
}

impl ColorSpace {
    /// HDR color spaces, only representable by 10-bit pixel formats.
    pub fn is_hdr(&self) -> bool {
        matches!(
            self,
            ColorSpace::BT2020_HLG | ColorSpace::BT2020_PQ | ColorSpace::BT2020_HLG_LIMIT | ColorSpace::BT2020_PQ_LIMIT
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Rotation {
    #[default]
    None,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotation90 => 90,
            Rotation::Rotation180 => 180,
            Rotation::Rotation270 => 270,
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Rotation90),
            180 => Ok(Rotation::Rotation180),
            270 => Ok(Rotation::Rotation270),
            _ => Err(invalid_param_error!(value)),
        }
    }
}

/// Operating modes negotiated with the device at commit time.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum OperationMode {
    #[default]
    Normal = 0,
    Capture,
    Video,
    Portrait,
    Night,
    Profession,
    SlowMotion,
    Scan,
    CaptureMacro,
    VideoMacro,
    ProfessionalPhoto,
    ProfessionalVideo,
    HighFrameRate,
    HighResolutionPhoto,
    Secure = 15,
}

impl OperationMode {
    pub fn is_secure(&self) -> bool {
        *self == OperationMode::Secure
    }
}

/// Hardware-side stream descriptor submitted at commit time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamInfo {
    pub stream_id: StreamId,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub color_space: ColorSpace,
    pub intent: StreamIntent,
    pub tunneled_mode: bool,
    pub has_producer: bool,
}
