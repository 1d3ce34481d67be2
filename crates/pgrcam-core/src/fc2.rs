//! FlyCapture2 C API backend
//!
//! Links against `libflycapture-c` and implements the [`crate::sdk`] traits
//! over it. Only the calls the session layer needs are declared.

#![allow(non_camel_case_types, non_snake_case)]

use std::any::Any;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_void};
use std::ptr;
use std::slice;

use crate::error::{ErrorCode, SdkResult};
use crate::sdk::{Context, Driver, NativeImage};
use crate::types::{
    CameraIdentity, CameraInfo, ImageHeader, PixelFormat, Property, PropertyInfo, PropertyType,
};

const MAX_STRING_LENGTH: usize = 512;

type fc2Context = *mut c_void;
type fc2Error = c_int;
type BOOL = c_int;

#[repr(C)]
#[derive(Clone, Copy)]
struct fc2PGRGuid {
    value: [c_uint; 4],
}

#[repr(C)]
struct fc2Image {
    rows: c_uint,
    cols: c_uint,
    stride: c_uint,
    pData: *mut c_uchar,
    dataSize: c_uint,
    receivedDataSize: c_uint,
    format: c_uint,
    bayerFormat: c_uint,
    imageImpl: *mut c_void,
}

#[repr(C)]
struct fc2PropertyInfo {
    type_: c_int,
    present: BOOL,
    autoSupported: BOOL,
    manualSupported: BOOL,
    onOffSupported: BOOL,
    onePushSupported: BOOL,
    absValSupported: BOOL,
    readOutSupported: BOOL,
    min: c_uint,
    max: c_uint,
    absMin: f32,
    absMax: f32,
    pUnits: [c_char; MAX_STRING_LENGTH],
    pUnitsAbbr: [c_char; MAX_STRING_LENGTH],
    reserved: [c_uint; 8],
}

#[repr(C)]
struct fc2Property {
    type_: c_int,
    present: BOOL,
    absControl: BOOL,
    onePush: BOOL,
    onOff: BOOL,
    autoManualMode: BOOL,
    valueA: c_uint,
    valueB: c_uint,
    absValue: f32,
    reserved: [c_uint; 8],
}

/// Leading fields of `fc2CameraInfo`. The SDK writes a much larger
/// structure, so the tail is reserved generously.
#[repr(C)]
struct fc2CameraInfo {
    serialNumber: c_uint,
    interfaceType: c_int,
    driverType: c_int,
    isColorCamera: BOOL,
    modelName: [c_char; MAX_STRING_LENGTH],
    vendorName: [c_char; MAX_STRING_LENGTH],
    sensorInfo: [c_char; MAX_STRING_LENGTH],
    sensorResolution: [c_char; MAX_STRING_LENGTH],
    driverName: [c_char; MAX_STRING_LENGTH],
    firmwareVersion: [c_char; MAX_STRING_LENGTH],
    firmwareBuildTime: [c_char; MAX_STRING_LENGTH],
    tail: [u8; 4096],
}

#[link(name = "flycapture-c")]
extern "C" {
    fn fc2CreateContext(pContext: *mut fc2Context) -> fc2Error;
    fn fc2DestroyContext(context: fc2Context) -> fc2Error;
    fn fc2GetNumOfCameras(context: fc2Context, pNumCameras: *mut c_uint) -> fc2Error;
    fn fc2GetCameraFromIndex(context: fc2Context, index: c_uint, pGuid: *mut fc2PGRGuid)
        -> fc2Error;
    fn fc2Connect(context: fc2Context, guid: *mut fc2PGRGuid) -> fc2Error;
    fn fc2Disconnect(context: fc2Context) -> fc2Error;
    fn fc2StartCapture(context: fc2Context) -> fc2Error;
    fn fc2StopCapture(context: fc2Context) -> fc2Error;
    fn fc2GetCameraInfo(context: fc2Context, pCameraInfo: *mut fc2CameraInfo) -> fc2Error;
    fn fc2CreateImage(pImage: *mut fc2Image) -> fc2Error;
    fn fc2DestroyImage(image: *mut fc2Image) -> fc2Error;
    fn fc2RetrieveBuffer(context: fc2Context, pImage: *mut fc2Image) -> fc2Error;
    fn fc2ReadRegister(context: fc2Context, address: c_uint, pValue: *mut c_uint) -> fc2Error;
    fn fc2WriteRegister(context: fc2Context, address: c_uint, value: c_uint) -> fc2Error;
    fn fc2GetPropertyInfo(context: fc2Context, propInfo: *mut fc2PropertyInfo) -> fc2Error;
    fn fc2GetProperty(context: fc2Context, prop: *mut fc2Property) -> fc2Error;
    fn fc2SetProperty(context: fc2Context, prop: *mut fc2Property) -> fc2Error;
    fn fc2ErrorToDescription(error: fc2Error) -> *const c_char;
}

fn check(error: fc2Error) -> SdkResult<()> {
    ErrorCode(error).check()
}

/// Description of a status as reported by the SDK itself.
pub fn sdk_description(code: ErrorCode) -> String {
    let ptr = unsafe { fc2ErrorToDescription(code.0) };
    if ptr.is_null() {
        return code.description().to_string();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn c_bool(b: bool) -> BOOL {
    BOOL::from(b)
}

/// The vendor SDK.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlyCaptureDriver;

impl Driver for FlyCaptureDriver {
    fn name(&self) -> &str {
        "flycapture2"
    }

    fn create_context(&self) -> SdkResult<Box<dyn Context>> {
        let mut raw: fc2Context = ptr::null_mut();
        check(unsafe { fc2CreateContext(&mut raw) })?;
        if raw.is_null() {
            return Err(ErrorCode::MEMORY_ALLOCATION_FAILED);
        }
        Ok(Box::new(FlyCaptureContext { raw }))
    }
}

struct FlyCaptureContext {
    raw: fc2Context,
}

// The context is only ever used from one thread at a time (the session
// layer serializes access); the SDK handle itself is not thread-bound.
unsafe impl Send for FlyCaptureContext {}

impl Context for FlyCaptureContext {
    fn num_cameras(&mut self) -> SdkResult<u32> {
        let mut count: c_uint = 0;
        check(unsafe { fc2GetNumOfCameras(self.raw, &mut count) })?;
        Ok(count)
    }

    fn camera_from_index(&mut self, index: u32) -> SdkResult<CameraIdentity> {
        let mut guid = fc2PGRGuid { value: [0; 4] };
        check(unsafe { fc2GetCameraFromIndex(self.raw, index, &mut guid) })?;
        Ok(CameraIdentity(guid.value))
    }

    fn connect(&mut self, identity: &CameraIdentity) -> SdkResult<()> {
        let mut guid = fc2PGRGuid { value: identity.0 };
        check(unsafe { fc2Connect(self.raw, &mut guid) })
    }

    fn disconnect(&mut self) -> SdkResult<()> {
        check(unsafe { fc2Disconnect(self.raw) })
    }

    fn start_capture(&mut self) -> SdkResult<()> {
        check(unsafe { fc2StartCapture(self.raw) })
    }

    fn stop_capture(&mut self) -> SdkResult<()> {
        check(unsafe { fc2StopCapture(self.raw) })
    }

    fn camera_info(&mut self) -> SdkResult<CameraInfo> {
        // Plain C data: all-zero is a valid value.
        let mut info: Box<fc2CameraInfo> = Box::new(unsafe { std::mem::zeroed() });
        check(unsafe { fc2GetCameraInfo(self.raw, &mut *info) })?;
        Ok(CameraInfo {
            serial_number: info.serialNumber,
            is_color: info.isColorCamera != 0,
            model_name: c_chars_to_string(&info.modelName),
            vendor_name: c_chars_to_string(&info.vendorName),
            sensor_info: c_chars_to_string(&info.sensorInfo),
            sensor_resolution: c_chars_to_string(&info.sensorResolution),
            driver_name: c_chars_to_string(&info.driverName),
            firmware_version: c_chars_to_string(&info.firmwareVersion),
        })
    }

    fn create_image(&mut self) -> SdkResult<Box<dyn NativeImage>> {
        let mut raw: Box<fc2Image> = Box::new(unsafe { std::mem::zeroed() });
        check(unsafe { fc2CreateImage(&mut *raw) })?;
        Ok(Box::new(FlyCaptureImage { raw }))
    }

    fn retrieve_buffer(&mut self, image: &mut dyn NativeImage) -> SdkResult<()> {
        let image = image
            .as_any_mut()
            .downcast_mut::<FlyCaptureImage>()
            .ok_or(ErrorCode::INVALID_PARAMETER)?;
        check(unsafe { fc2RetrieveBuffer(self.raw, &mut *image.raw) })
    }

    fn read_register(&mut self, address: u32) -> SdkResult<u32> {
        let mut value: c_uint = 0;
        check(unsafe { fc2ReadRegister(self.raw, address, &mut value) })?;
        Ok(value)
    }

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()> {
        check(unsafe { fc2WriteRegister(self.raw, address, value) })
    }

    fn property_info(&mut self, property_type: PropertyType) -> SdkResult<PropertyInfo> {
        let mut raw: fc2PropertyInfo = unsafe { std::mem::zeroed() };
        raw.type_ = property_type.as_raw();
        check(unsafe { fc2GetPropertyInfo(self.raw, &mut raw) })?;
        Ok(PropertyInfo {
            property_type,
            present: raw.present != 0,
            auto_supported: raw.autoSupported != 0,
            manual_supported: raw.manualSupported != 0,
            on_off_supported: raw.onOffSupported != 0,
            one_push_supported: raw.onePushSupported != 0,
            abs_val_supported: raw.absValSupported != 0,
            read_out_supported: raw.readOutSupported != 0,
            min: raw.min,
            max: raw.max,
            abs_min: raw.absMin,
            abs_max: raw.absMax,
            units: c_chars_to_string(&raw.pUnits),
            units_abbr: c_chars_to_string(&raw.pUnitsAbbr),
        })
    }

    fn property(&mut self, property_type: PropertyType) -> SdkResult<Property> {
        let mut raw: fc2Property = unsafe { std::mem::zeroed() };
        raw.type_ = property_type.as_raw();
        check(unsafe { fc2GetProperty(self.raw, &mut raw) })?;
        Ok(Property {
            property_type,
            present: raw.present != 0,
            abs_control: raw.absControl != 0,
            one_push: raw.onePush != 0,
            on_off: raw.onOff != 0,
            auto_manual_mode: raw.autoManualMode != 0,
            value_a: raw.valueA,
            value_b: raw.valueB,
            abs_value: raw.absValue,
        })
    }

    fn set_property(&mut self, property: &Property) -> SdkResult<()> {
        let mut raw = fc2Property {
            type_: property.property_type.as_raw(),
            present: c_bool(property.present),
            absControl: c_bool(property.abs_control),
            onePush: c_bool(property.one_push),
            onOff: c_bool(property.on_off),
            autoManualMode: c_bool(property.auto_manual_mode),
            valueA: property.value_a,
            valueB: property.value_b,
            absValue: property.abs_value,
            reserved: [0; 8],
        };
        check(unsafe { fc2SetProperty(self.raw, &mut raw) })
    }

    fn destroy(self: Box<Self>) -> SdkResult<()> {
        check(unsafe { fc2DestroyContext(self.raw) })
    }
}

struct FlyCaptureImage {
    // Boxed so the SDK's internal pointers stay put.
    raw: Box<fc2Image>,
}

unsafe impl Send for FlyCaptureImage {}

impl NativeImage for FlyCaptureImage {
    fn header(&self) -> ImageHeader {
        ImageHeader {
            rows: self.raw.rows,
            cols: self.raw.cols,
            stride: self.raw.stride,
            data_size: self.raw.dataSize,
            received_data_size: self.raw.receivedDataSize,
            format: PixelFormat::from_raw(self.raw.format),
            bayer_format: self.raw.bayerFormat,
        }
    }

    fn data(&self) -> &[u8] {
        if self.raw.pData.is_null() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.raw.pData, self.raw.dataSize as usize) }
    }

    fn destroy(mut self: Box<Self>) -> SdkResult<()> {
        check(unsafe { fc2DestroyImage(&mut *self.raw) })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
