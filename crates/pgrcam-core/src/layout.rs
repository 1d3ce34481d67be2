//! Fixed-size host record layouts
//!
//! Hosts exchange image descriptors and property records as flat byte
//! blocks. Each block has exactly the size of the corresponding FlyCapture2
//! structure on a 64-bit target, so hosts that still treat them as raw
//! structure copies keep working. Fields are written one by one in native
//! byte order; nothing here transmutes memory.
//!
//! # Image descriptor (48 bytes, mirrors `fc2Image`)
//!
//! | offset | size | field                                        |
//! |-------:|-----:|----------------------------------------------|
//! |      0 |    4 | rows                                         |
//! |      4 |    4 | cols                                         |
//! |      8 |    4 | stride                                       |
//! |     12 |    4 | layout version (padding in `fc2Image`)       |
//! |     16 |    8 | image token (`pData` in `fc2Image`)          |
//! |     24 |    4 | dataSize                                     |
//! |     28 |    4 | receivedDataSize                             |
//! |     32 |    4 | pixel format                                 |
//! |     36 |    4 | bayer tile format                            |
//! |     40 |    4 | magic `0x49524750` (`imageImpl` low word)    |
//! |     44 |    4 | reserved, zero                               |
//!
//! # Property descriptor (1104 bytes, mirrors `fc2PropertyInfo`)
//!
//! type (i32) at 0, seven BOOL flags at 4..32 (present, autoSupported,
//! manualSupported, onOffSupported, onePushSupported, absValSupported,
//! readOutSupported), min at 32, max at 36, absMin (f32) at 40, absMax at
//! 44, units (512 bytes, NUL terminated) at 48, units abbreviation at 560,
//! reserved[8] at 1072. reserved[0] carries the layout version.
//!
//! # Property value (68 bytes, mirrors `fc2Property`)
//!
//! type (i32) at 0, five BOOL flags at 4..24 (present, absControl, onePush,
//! onOff, autoManualMode), valueA at 24, valueB at 28, absValue (f32) at 32,
//! reserved[8] at 36. reserved[0] carries the layout version.

use crate::error::{CaptureError, Result};
use crate::types::{ImageHeader, PixelFormat, Property, PropertyInfo, PropertyType};

/// Version written into every record this crate produces.
pub const LAYOUT_VERSION: u32 = 1;

pub const IMAGE_DESCRIPTOR_SIZE: usize = 48;
pub const PROPERTY_INFO_SIZE: usize = 1104;
pub const PROPERTY_SIZE: usize = 68;

/// Length of each units string field, terminator included.
pub const UNITS_FIELD_LEN: usize = 512;

const IMAGE_MAGIC: u32 = 0x4952_4750;

mod image_off {
    pub const ROWS: usize = 0;
    pub const COLS: usize = 4;
    pub const STRIDE: usize = 8;
    pub const VERSION: usize = 12;
    pub const TOKEN: usize = 16;
    pub const DATA_SIZE: usize = 24;
    pub const RECEIVED: usize = 28;
    pub const FORMAT: usize = 32;
    pub const BAYER: usize = 36;
    pub const MAGIC: usize = 40;
}

mod info_off {
    pub const TYPE: usize = 0;
    pub const FLAGS: usize = 4;
    pub const MIN: usize = 32;
    pub const MAX: usize = 36;
    pub const ABS_MIN: usize = 40;
    pub const ABS_MAX: usize = 44;
    pub const UNITS: usize = 48;
    pub const UNITS_ABBR: usize = 560;
    pub const RESERVED: usize = 1072;
}

mod prop_off {
    pub const TYPE: usize = 0;
    pub const FLAGS: usize = 4;
    pub const VALUE_A: usize = 24;
    pub const VALUE_B: usize = 28;
    pub const ABS_VALUE: usize = 32;
    pub const RESERVED: usize = 36;
}

/// Host-side view of an image slot: the token naming the SDK image plus the
/// header of the last frame retrieved into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub token: u64,
    pub header: ImageHeader,
}

impl ImageDescriptor {
    pub fn encode(&self) -> [u8; IMAGE_DESCRIPTOR_SIZE] {
        let mut buf = [0u8; IMAGE_DESCRIPTOR_SIZE];
        let h = &self.header;
        put_u32(&mut buf, image_off::ROWS, h.rows);
        put_u32(&mut buf, image_off::COLS, h.cols);
        put_u32(&mut buf, image_off::STRIDE, h.stride);
        put_u32(&mut buf, image_off::VERSION, LAYOUT_VERSION);
        put_u64(&mut buf, image_off::TOKEN, self.token);
        put_u32(&mut buf, image_off::DATA_SIZE, h.data_size);
        put_u32(&mut buf, image_off::RECEIVED, h.received_data_size);
        put_u32(&mut buf, image_off::FORMAT, h.format.as_raw());
        put_u32(&mut buf, image_off::BAYER, h.bayer_format);
        put_u32(&mut buf, image_off::MAGIC, IMAGE_MAGIC);
        buf
    }

    /// Write the encoded descriptor into a host buffer of exactly the record size.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<()> {
        check_len("image descriptor", out.len(), IMAGE_DESCRIPTOR_SIZE)?;
        out.copy_from_slice(&self.encode());
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len("image descriptor", buf.len(), IMAGE_DESCRIPTOR_SIZE)?;
        if get_u32(buf, image_off::MAGIC) != IMAGE_MAGIC {
            return Err(CaptureError::invalid_argument(
                "buffer is not an image descriptor created by this library",
            ));
        }
        let version = get_u32(buf, image_off::VERSION);
        if version != LAYOUT_VERSION {
            return Err(CaptureError::invalid_argument(format!(
                "unsupported image descriptor layout version {}",
                version
            )));
        }
        Ok(Self {
            token: get_u64(buf, image_off::TOKEN),
            header: ImageHeader {
                rows: get_u32(buf, image_off::ROWS),
                cols: get_u32(buf, image_off::COLS),
                stride: get_u32(buf, image_off::STRIDE),
                data_size: get_u32(buf, image_off::DATA_SIZE),
                received_data_size: get_u32(buf, image_off::RECEIVED),
                format: PixelFormat::from_raw(get_u32(buf, image_off::FORMAT)),
                bayer_format: get_u32(buf, image_off::BAYER),
            },
        })
    }
}

pub fn encode_property_info(info: &PropertyInfo) -> [u8; PROPERTY_INFO_SIZE] {
    let mut buf = [0u8; PROPERTY_INFO_SIZE];
    put_i32(&mut buf, info_off::TYPE, info.property_type.as_raw());
    let flags = [
        info.present,
        info.auto_supported,
        info.manual_supported,
        info.on_off_supported,
        info.one_push_supported,
        info.abs_val_supported,
        info.read_out_supported,
    ];
    put_flags(&mut buf, info_off::FLAGS, &flags);
    put_u32(&mut buf, info_off::MIN, info.min);
    put_u32(&mut buf, info_off::MAX, info.max);
    put_f32(&mut buf, info_off::ABS_MIN, info.abs_min);
    put_f32(&mut buf, info_off::ABS_MAX, info.abs_max);
    put_cstr(&mut buf, info_off::UNITS, &info.units);
    put_cstr(&mut buf, info_off::UNITS_ABBR, &info.units_abbr);
    put_u32(&mut buf, info_off::RESERVED, LAYOUT_VERSION);
    buf
}

pub fn decode_property_info(buf: &[u8]) -> Result<PropertyInfo> {
    check_len("property descriptor", buf.len(), PROPERTY_INFO_SIZE)?;
    check_version("property descriptor", get_u32(buf, info_off::RESERVED))?;
    let flags = get_flags::<7>(buf, info_off::FLAGS);
    Ok(PropertyInfo {
        property_type: PropertyType::try_from(get_i32(buf, info_off::TYPE))?,
        present: flags[0],
        auto_supported: flags[1],
        manual_supported: flags[2],
        on_off_supported: flags[3],
        one_push_supported: flags[4],
        abs_val_supported: flags[5],
        read_out_supported: flags[6],
        min: get_u32(buf, info_off::MIN),
        max: get_u32(buf, info_off::MAX),
        abs_min: get_f32(buf, info_off::ABS_MIN),
        abs_max: get_f32(buf, info_off::ABS_MAX),
        units: get_cstr(buf, info_off::UNITS),
        units_abbr: get_cstr(buf, info_off::UNITS_ABBR),
    })
}

pub fn encode_property(property: &Property) -> [u8; PROPERTY_SIZE] {
    let mut buf = [0u8; PROPERTY_SIZE];
    put_i32(&mut buf, prop_off::TYPE, property.property_type.as_raw());
    let flags = [
        property.present,
        property.abs_control,
        property.one_push,
        property.on_off,
        property.auto_manual_mode,
    ];
    put_flags(&mut buf, prop_off::FLAGS, &flags);
    put_u32(&mut buf, prop_off::VALUE_A, property.value_a);
    put_u32(&mut buf, prop_off::VALUE_B, property.value_b);
    put_f32(&mut buf, prop_off::ABS_VALUE, property.abs_value);
    put_u32(&mut buf, prop_off::RESERVED, LAYOUT_VERSION);
    buf
}

/// Decode a host property record.
///
/// Fails with an argument error when the size is wrong or the type tag is
/// not a known property type.
pub fn decode_property(buf: &[u8]) -> Result<Property> {
    check_len("property value", buf.len(), PROPERTY_SIZE)?;
    check_version("property value", get_u32(buf, prop_off::RESERVED))?;
    let flags = get_flags::<5>(buf, prop_off::FLAGS);
    Ok(Property {
        property_type: PropertyType::try_from(get_i32(buf, prop_off::TYPE))?,
        present: flags[0],
        abs_control: flags[1],
        one_push: flags[2],
        on_off: flags[3],
        auto_manual_mode: flags[4],
        value_a: get_u32(buf, prop_off::VALUE_A),
        value_b: get_u32(buf, prop_off::VALUE_B),
        abs_value: get_f32(buf, prop_off::ABS_VALUE),
    })
}

/// Copy an encoded record into a host buffer of exactly the record size.
pub fn write_record(what: &str, record: &[u8], out: &mut [u8]) -> Result<()> {
    check_len(what, out.len(), record.len())?;
    out.copy_from_slice(record);
    Ok(())
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CaptureError::invalid_argument(format!(
            "{} must be exactly {} bytes, got {}",
            what, expected, actual
        )));
    }
    Ok(())
}

// Zero is accepted so hosts may build records from scratch.
fn check_version(what: &str, version: u32) -> Result<()> {
    if version != 0 && version != LAYOUT_VERSION {
        return Err(CaptureError::invalid_argument(format!(
            "unsupported {} layout version {}",
            what, version
        )));
    }
    Ok(())
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_ne_bytes());
}

fn put_f32(buf: &mut [u8], off: usize, v: f32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn put_flags(buf: &mut [u8], off: usize, flags: &[bool]) {
    for (i, &flag) in flags.iter().enumerate() {
        put_i32(buf, off + i * 4, i32::from(flag));
    }
}

fn put_cstr(buf: &mut [u8], off: usize, s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(UNITS_FIELD_LEN - 1);
    buf[off..off + n].copy_from_slice(&bytes[..n]);
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_ne_bytes(b)
}

fn get_i32(buf: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    i32::from_ne_bytes(b)
}

fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_ne_bytes(b)
}

fn get_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_bits(get_u32(buf, off))
}

fn get_flags<const N: usize>(buf: &[u8], off: usize) -> [bool; N] {
    let mut flags = [false; N];
    for (i, flag) in flags.iter_mut().enumerate() {
        *flag = get_i32(buf, off + i * 4) != 0;
    }
    flags
}

fn get_cstr(buf: &[u8], off: usize) -> String {
    let field = &buf[off..off + UNITS_FIELD_LEN];
    let end = field.iter().position(|&b| b == 0).unwrap_or(UNITS_FIELD_LEN);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn shutter_info() -> PropertyInfo {
        PropertyInfo {
            present: true,
            auto_supported: true,
            manual_supported: true,
            abs_val_supported: true,
            min: 1,
            max: 4095,
            abs_min: 0.01,
            abs_max: 33.3,
            units: "ms".to_string(),
            units_abbr: "ms".to_string(),
            ..PropertyInfo::absent(PropertyType::Shutter)
        }
    }

    #[test]
    fn test_sizes_match_native_structures() {
        assert_eq!(IMAGE_DESCRIPTOR_SIZE, 48);
        assert_eq!(PROPERTY_INFO_SIZE, 4 + 7 * 4 + 4 * 4 + 2 * UNITS_FIELD_LEN + 8 * 4);
        assert_eq!(PROPERTY_SIZE, 4 + 5 * 4 + 3 * 4 + 8 * 4);
    }

    #[test]
    fn test_image_descriptor_field_offsets() {
        let desc = ImageDescriptor {
            token: 0x0102_0304_0506_0708,
            header: ImageHeader {
                rows: 480,
                cols: 640,
                stride: 1920,
                data_size: 921_600,
                received_data_size: 921_600,
                format: PixelFormat::Rgb8,
                bayer_format: 0,
            },
        };
        let buf = desc.encode();
        assert_eq!(get_u32(&buf, 0), 480);
        assert_eq!(get_u32(&buf, 4), 640);
        assert_eq!(get_u32(&buf, 8), 1920);
        assert_eq!(get_u64(&buf, 16), 0x0102_0304_0506_0708);
        assert_eq!(get_u32(&buf, 32), PixelFormat::Rgb8.as_raw());
        assert_eq!(ImageDescriptor::decode(&buf).unwrap(), desc);
    }

    #[test]
    fn test_image_descriptor_rejects_off_by_one_sizes() {
        let desc = ImageDescriptor {
            token: 7,
            header: ImageHeader::empty(),
        };
        let buf = desc.encode();
        let mut longer = buf.to_vec();
        longer.push(0);

        let err = ImageDescriptor::decode(&buf[..IMAGE_DESCRIPTOR_SIZE - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = ImageDescriptor::decode(&longer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_image_descriptor_rejects_foreign_bytes() {
        let err = ImageDescriptor::decode(&[0u8; IMAGE_DESCRIPTOR_SIZE]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_property_info_layout() {
        let buf = encode_property_info(&shutter_info());
        assert_eq!(get_i32(&buf, 0), PropertyType::Shutter.as_raw());
        assert_eq!(get_i32(&buf, 4), 1); // present
        assert_eq!(get_i32(&buf, 16), 0); // onOffSupported
        assert_eq!(get_u32(&buf, 36), 4095);
        assert_eq!(&buf[48..51], b"ms\0");
        assert_eq!(decode_property_info(&buf).unwrap(), shutter_info());
    }

    #[test]
    fn test_units_truncated_to_field() {
        let mut info = shutter_info();
        info.units = "x".repeat(600);
        let decoded = decode_property_info(&encode_property_info(&info)).unwrap();
        assert_eq!(decoded.units.len(), UNITS_FIELD_LEN - 1);
    }

    #[test]
    fn test_property_with_unknown_tag_is_rejected() {
        let mut buf = encode_property(&Property::empty(PropertyType::Gain));
        buf[0..4].copy_from_slice(&99i32.to_ne_bytes());
        let err = decode_property(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_property_accepts_zeroed_reserved_words() {
        let mut buf = encode_property(&Property {
            present: true,
            value_a: 300,
            ..Property::empty(PropertyType::Gain)
        });
        buf[prop_off::RESERVED..].fill(0);
        let decoded = decode_property(&buf).unwrap();
        assert_eq!(decoded.value_a, 300);
        assert!(decoded.present);
    }

    #[test]
    fn test_write_record_checks_length() {
        let record = encode_property(&Property::empty(PropertyType::Hue));
        let mut out = vec![0u8; PROPERTY_SIZE + 1];
        assert!(write_record("property value", &record, &mut out).is_err());
        let mut out = vec![0u8; PROPERTY_SIZE];
        write_record("property value", &record, &mut out).unwrap();
        assert_eq!(out, record.to_vec());
    }
}
