//! Core camera types
//!
//! These mirror the SDK's value types. Conversion to the fixed host byte
//! layouts lives in [`crate::layout`].

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};

/// Stable identifier for one enumerated camera (the SDK's 4-word GUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CameraIdentity(pub [u32; 4]);

impl CameraIdentity {
    pub const WORDS: usize = 4;

    /// Build an identity from host-supplied words, rejecting any other length.
    pub fn from_words(words: &[u32]) -> Result<Self> {
        let words: [u32; Self::WORDS] = words.try_into().map_err(|_| {
            CaptureError::invalid_argument(format!(
                "camera identity must have {} words, got {}",
                Self::WORDS,
                words.len()
            ))
        })?;
        Ok(Self(words))
    }

    pub fn words(&self) -> &[u32; 4] {
        &self.0
    }
}

/// Static descriptive metadata for a connected camera.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CameraInfo {
    pub serial_number: u32,
    pub is_color: bool,
    pub model_name: String,
    pub vendor_name: String,
    pub sensor_info: String,
    pub sensor_resolution: String,
    pub driver_name: String,
    pub firmware_version: String,
}

/// Camera controls defined by the SDK.
///
/// Discriminants match `fc2PropertyType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum PropertyType {
    Brightness = 0,
    AutoExposure = 1,
    Sharpness = 2,
    WhiteBalance = 3,
    Hue = 4,
    Saturation = 5,
    Gamma = 6,
    Iris = 7,
    Focus = 8,
    Zoom = 9,
    Pan = 10,
    Tilt = 11,
    Shutter = 12,
    Gain = 13,
    TriggerMode = 14,
    TriggerDelay = 15,
    FrameRate = 16,
    Temperature = 17,
}

impl PropertyType {
    pub const ALL: [PropertyType; 18] = [
        PropertyType::Brightness,
        PropertyType::AutoExposure,
        PropertyType::Sharpness,
        PropertyType::WhiteBalance,
        PropertyType::Hue,
        PropertyType::Saturation,
        PropertyType::Gamma,
        PropertyType::Iris,
        PropertyType::Focus,
        PropertyType::Zoom,
        PropertyType::Pan,
        PropertyType::Tilt,
        PropertyType::Shutter,
        PropertyType::Gain,
        PropertyType::TriggerMode,
        PropertyType::TriggerDelay,
        PropertyType::FrameRate,
        PropertyType::Temperature,
    ];

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for PropertyType {
    type Error = CaptureError;

    fn try_from(raw: i32) -> Result<Self> {
        usize::try_from(raw)
            .ok()
            .and_then(|i| PropertyType::ALL.get(i).copied())
            .ok_or_else(|| CaptureError::invalid_argument(format!("unknown property type {}", raw)))
    }
}

/// Capabilities and range of one camera control.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub property_type: PropertyType,
    pub present: bool,
    pub auto_supported: bool,
    pub manual_supported: bool,
    pub on_off_supported: bool,
    pub one_push_supported: bool,
    pub abs_val_supported: bool,
    pub read_out_supported: bool,
    pub min: u32,
    pub max: u32,
    pub abs_min: f32,
    pub abs_max: f32,
    /// Units of the absolute value, e.g. "ms" for shutter
    pub units: String,
    pub units_abbr: String,
}

impl PropertyInfo {
    /// Descriptor for a control the camera does not have.
    pub fn absent(property_type: PropertyType) -> Self {
        Self {
            property_type,
            present: false,
            auto_supported: false,
            manual_supported: false,
            on_off_supported: false,
            one_push_supported: false,
            abs_val_supported: false,
            read_out_supported: false,
            min: 0,
            max: 0,
            abs_min: 0.0,
            abs_max: 0.0,
            units: String::new(),
            units_abbr: String::new(),
        }
    }
}

/// Current or desired state of one camera control.
///
/// Always written whole: the SDK decides which of `value_a`, `value_b` and
/// `abs_value` apply from `abs_control`, `on_off` and `auto_manual_mode`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    pub property_type: PropertyType,
    pub present: bool,
    pub abs_control: bool,
    pub one_push: bool,
    pub on_off: bool,
    pub auto_manual_mode: bool,
    pub value_a: u32,
    pub value_b: u32,
    pub abs_value: f32,
}

impl Property {
    /// Zeroed value for a property type, as the SDK expects before a read.
    pub fn empty(property_type: PropertyType) -> Self {
        Self {
            property_type,
            present: false,
            abs_control: false,
            one_push: false,
            on_off: false,
            auto_manual_mode: false,
            value_a: 0,
            value_b: 0,
            abs_value: 0.0,
        }
    }
}

/// Pixel formats the session layer recognizes.
///
/// Raw values are the SDK's `fc2PixelFormat` bit flags. Unknown formats are
/// carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Mono8,
    Mono16,
    Raw8,
    Rgb8,
    Bgr,
    Other(u32),
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x8000_0000 => PixelFormat::Mono8,
            0x0400_0000 => PixelFormat::Mono16,
            0x0040_0000 => PixelFormat::Raw8,
            0x4000_0000 => PixelFormat::Rgb8,
            0x8000_0008 => PixelFormat::Bgr,
            other => PixelFormat::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            PixelFormat::Mono8 => 0x8000_0000,
            PixelFormat::Mono16 => 0x0400_0000,
            PixelFormat::Raw8 => 0x0040_0000,
            PixelFormat::Rgb8 => 0x4000_0000,
            PixelFormat::Bgr => 0x8000_0008,
            PixelFormat::Other(raw) => raw,
        }
    }
}

/// Geometry and bookkeeping of the most recently retrieved frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub rows: u32,
    pub cols: u32,
    /// Bytes per row, including padding
    pub stride: u32,
    pub data_size: u32,
    pub received_data_size: u32,
    pub format: PixelFormat,
    pub bayer_format: u32,
}

impl ImageHeader {
    /// Header of an image that has not received a frame yet.
    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            stride: 0,
            data_size: 0,
            received_data_size: 0,
            format: PixelFormat::Other(0),
            bayer_format: 0,
        }
    }

    /// Bytes that make up the frame: `rows * stride`.
    pub fn frame_len(&self) -> usize {
        self.rows as usize * self.stride as usize
    }
}

/// Connection state of a session.
///
/// Tracked for reporting; the SDK remains the authority on which calls are
/// valid. Discriminants are part of the C interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SessionState {
    Created = 0,
    Connected = 1,
    Capturing = 2,
    Stopped = 3,
    Destroyed = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_requires_four_words() {
        let id = CameraIdentity::from_words(&[1, 2, 3, 4]).unwrap();
        assert_eq!(id.words(), &[1, 2, 3, 4]);

        assert!(CameraIdentity::from_words(&[1, 2, 3]).is_err());
        assert!(CameraIdentity::from_words(&[1, 2, 3, 4, 5]).is_err());
        assert!(CameraIdentity::from_words(&[]).is_err());
    }

    #[test]
    fn test_property_type_from_raw() {
        assert_eq!(PropertyType::try_from(13).unwrap(), PropertyType::Gain);
        assert_eq!(PropertyType::try_from(0).unwrap(), PropertyType::Brightness);
        assert!(PropertyType::try_from(18).is_err());
        assert!(PropertyType::try_from(-1).is_err());
    }

    #[test]
    fn test_property_type_discriminants_follow_table() {
        for (i, ty) in PropertyType::ALL.iter().enumerate() {
            assert_eq!(ty.as_raw(), i as i32);
        }
    }

    #[test]
    fn test_pixel_format_unknown_passthrough() {
        assert_eq!(PixelFormat::from_raw(0x8000_0000), PixelFormat::Mono8);
        assert_eq!(PixelFormat::from_raw(0x1234).as_raw(), 0x1234);
    }

    #[test]
    fn test_frame_len_uses_stride() {
        let header = ImageHeader {
            rows: 480,
            cols: 640,
            stride: 1920,
            ..ImageHeader::empty()
        };
        assert_eq!(header.frame_len(), 480 * 1920);
    }
}
