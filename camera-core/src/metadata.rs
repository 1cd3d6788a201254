use std::collections::BTreeMap;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

/// Metadata tags understood by the session layer.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum MetadataTag {
    SensorOrientation = 0x0001_0000,
    AbilityCameraModes,
    AbilityZoomPerformance,
    AbilityMovingPhoto,
    AbilityZoomBezierCurve,
    StatusCurrentFps = 0x0002_0000,
    StatusCurrentZoomRatio,
    ControlMuteMode = 0x0003_0000,
    ControlSmoothZoomRatios,
    ControlZoomRatio,
    ControlBurstCapture,
    ControlMirror,
    JpegOrientation = 0x0004_0000,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MuteMode {
    Off = 0,
    SolidColorBlack = 1,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
}

impl MetadataValue {
    pub fn count(&self) -> usize {
        match self {
            MetadataValue::Byte(v) => v.len(),
            MetadataValue::Int32(v) => v.len(),
            MetadataValue::UInt32(v) => v.len(),
            MetadataValue::Int64(v) => v.len(),
            MetadataValue::Float(v) => v.len(),
        }
    }
}

/// Tag → value settings blob exchanged with the device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraMetadata {
    entries: BTreeMap<MetadataTag, MetadataValue>,
}

impl CameraMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `tag`, returning whether an entry was replaced.
    pub fn add_entry(&mut self, tag: MetadataTag, value: MetadataValue) -> bool {
        self.entries.insert(tag, value).is_some()
    }

    pub fn remove_entry(&mut self, tag: MetadataTag) -> Option<MetadataValue> {
        self.entries.remove(&tag)
    }

    pub fn find(&self, tag: MetadataTag) -> Option<&MetadataValue> {
        self.entries.get(&tag)
    }

    pub fn contains(&self, tag: MetadataTag) -> bool {
        self.entries.contains_key(&tag)
    }

    pub fn find_u8(&self, tag: MetadataTag) -> Option<u8> {
        match self.find(tag)? {
            MetadataValue::Byte(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn find_i32(&self, tag: MetadataTag) -> Option<i32> {
        match self.find(tag)? {
            MetadataValue::Int32(v) => v.first().copied(),
            MetadataValue::UInt32(v) => v.first().map(|v| *v as i32),
            _ => None,
        }
    }

    pub fn find_u32_array(&self, tag: MetadataTag) -> Option<&[u32]> {
        match self.find(tag)? {
            MetadataValue::UInt32(v) => Some(v),
            _ => None,
        }
    }

    pub fn find_f32_array(&self, tag: MetadataTag) -> Option<&[f32]> {
        match self.find(tag)? {
            MetadataValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Overlays every entry of `other` on top of this blob.
    pub fn merge(&mut self, other: &CameraMetadata) {
        for (tag, value) in &other.entries {
            self.entries.insert(*tag, value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataTag, &MetadataValue)> {
        self.entries.iter()
    }
}
