//! In-process simulated capture SDK
//!
//! Behaves like the FlyCapture2 C API closely enough to exercise every path
//! of the session layer without hardware:
//!
//! - cameras are enumerated from a [`SimConfig`]; a camera bound by one
//!   context is busy for the others
//! - streaming must be started before frames can be retrieved; double
//!   start and stop-without-start are rejected with the SDK's codes
//! - frames are synthesized (8-bit mono, or RGB with optional row padding)
//! - each camera has a register file and a property table
//! - any operation can be made to fail once via [`SimDriver::fail_next`]
//! - live contexts and images are counted so tests can assert nothing leaked

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, ErrorCode, Operation, Result, SdkResult};
use crate::sdk::{Context, Driver, NativeImage};
use crate::types::{
    CameraIdentity, CameraInfo, ImageHeader, PixelFormat, Property, PropertyInfo, PropertyType,
};

/// One simulated camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimCameraConfig {
    pub serial_number: u32,
    pub model_name: String,
    pub vendor_name: String,
    pub sensor_info: String,
    pub driver_name: String,
    pub firmware_version: String,
    /// Produce interleaved RGB frames instead of 8-bit mono
    pub color: bool,
    pub width: u32,
    pub height: u32,
    /// Extra bytes at the end of each row
    pub row_padding: u32,
    /// Initial register contents
    pub registers: BTreeMap<u32, u32>,
    /// Registers that reject writes
    pub read_only_registers: Vec<u32>,
}

impl Default for SimCameraConfig {
    fn default() -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(0x0610, 0x8000_0000); // camera power
        registers.insert(0x0614, 0x0000_0000); // iso enable
        registers.insert(0x1F28, 0x0000_0000); // frame info
        Self {
            serial_number: 13_142_459,
            model_name: "Flea3 FL3-U3-13E4M".to_string(),
            vendor_name: "Point Grey Research".to_string(),
            sensor_info: "e2v EV76C560 (1/1.8\" Mono CMOS)".to_string(),
            driver_name: "simulated".to_string(),
            firmware_version: "2.6.3.0".to_string(),
            color: false,
            width: 640,
            height: 480,
            row_padding: 0,
            registers,
            read_only_registers: vec![0x0400],
        }
    }
}

impl SimCameraConfig {
    /// A color camera with tightly packed RGB rows.
    pub fn color(width: u32, height: u32) -> Self {
        Self {
            model_name: "Flea3 FL3-U3-13E4C".to_string(),
            sensor_info: "e2v EV76C560 (1/1.8\" Color CMOS)".to_string(),
            color: true,
            width,
            height,
            ..Self::default()
        }
    }

    pub fn mono(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Row stride and whole-frame length in bytes, or `None` when either
    /// does not fit in 32 bits.
    fn geometry(&self) -> Option<(u32, u32)> {
        let bytes_per_pixel = if self.color { 3 } else { 1 };
        let stride = self
            .width
            .checked_mul(bytes_per_pixel)?
            .checked_add(self.row_padding)?;
        let len = stride.checked_mul(self.height)?;
        Some((stride, len))
    }
}

/// Simulator configuration: the cameras visible on the simulated bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cameras: Vec<SimCameraConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cameras: vec![SimCameraConfig::default()],
        }
    }
}

impl SimConfig {
    /// A bus with no cameras attached.
    pub fn empty() -> Self {
        Self {
            cameras: Vec::new(),
        }
    }

    pub fn with_camera(mut self, camera: SimCameraConfig) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            CaptureError::invalid_argument(format!("invalid simulator configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject cameras whose frame size overflows the SDK's 32-bit fields.
    pub fn validate(&self) -> Result<()> {
        for (index, camera) in self.cameras.iter().enumerate() {
            if camera.geometry().is_none() {
                return Err(CaptureError::invalid_argument(format!(
                    "camera {}: {}x{} frame with {} padding bytes per row is too large",
                    index, camera.width, camera.height, camera.row_padding
                )));
            }
        }
        Ok(())
    }
}

struct SimCamera {
    config: SimCameraConfig,
    identity: CameraIdentity,
    registers: HashMap<u32, u32>,
    read_only: HashSet<u32>,
    properties: BTreeMap<PropertyType, (PropertyInfo, Property)>,
    bound_to: Option<u64>,
}

impl SimCamera {
    fn new(index: usize, config: SimCameraConfig) -> Self {
        let identity = CameraIdentity([
            0x5047_5200 | index as u32,
            config.serial_number,
            0x00B0_9D00,
            index as u32,
        ]);
        let properties = default_properties(config.color);
        Self {
            identity,
            registers: config.registers.iter().map(|(&a, &v)| (a, v)).collect(),
            read_only: config.read_only_registers.iter().copied().collect(),
            properties,
            bound_to: None,
            config,
        }
    }

    fn info(&self) -> CameraInfo {
        let c = &self.config;
        CameraInfo {
            serial_number: c.serial_number,
            is_color: c.color,
            model_name: c.model_name.clone(),
            vendor_name: c.vendor_name.clone(),
            sensor_info: c.sensor_info.clone(),
            sensor_resolution: format!("{}x{}", c.width, c.height),
            driver_name: c.driver_name.clone(),
            firmware_version: c.firmware_version.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn control(
    ty: PropertyType,
    min: u32,
    max: u32,
    abs_min: f32,
    abs_max: f32,
    units: &str,
    value_a: u32,
    abs_value: f32,
) -> (PropertyType, (PropertyInfo, Property)) {
    let info = PropertyInfo {
        present: true,
        auto_supported: true,
        manual_supported: true,
        on_off_supported: true,
        one_push_supported: true,
        abs_val_supported: !units.is_empty(),
        read_out_supported: true,
        min,
        max,
        abs_min,
        abs_max,
        units: units.to_string(),
        units_abbr: units.to_string(),
        ..PropertyInfo::absent(ty)
    };
    let value = Property {
        present: true,
        on_off: true,
        value_a,
        abs_value,
        ..Property::empty(ty)
    };
    (ty, (info, value))
}

fn default_properties(color: bool) -> BTreeMap<PropertyType, (PropertyInfo, Property)> {
    let mut table: BTreeMap<_, _> = [
        control(PropertyType::Brightness, 0, 255, 0.0, 6.24, "%", 0, 0.0),
        control(PropertyType::AutoExposure, 1, 1023, -7.58, 2.41, "EV", 512, 0.0),
        control(PropertyType::Sharpness, 0, 4095, 0.0, 0.0, "", 1024, 0.0),
        control(PropertyType::Gamma, 512, 4095, 0.5, 4.0, "", 1024, 1.0),
        control(PropertyType::Shutter, 1, 1535, 0.046, 32.75, "ms", 500, 10.0),
        control(PropertyType::Gain, 0, 1023, 0.0, 24.0, "dB", 0, 0.0),
        control(PropertyType::FrameRate, 1, 480, 1.0, 60.0, "fps", 480, 30.0),
        control(PropertyType::Temperature, 0, 4095, 0.0, 0.0, "", 2980, 0.0),
    ]
    .into_iter()
    .collect();
    if color {
        let (ty, (info, mut value)) =
            control(PropertyType::WhiteBalance, 0, 1023, 0.0, 0.0, "", 482, 0.0);
        value.value_b = 762; // blue/red pair
        table.insert(ty, (info, value));
    }
    table
}

struct Bus {
    cameras: Vec<SimCamera>,
    faults: HashMap<Operation, VecDeque<ErrorCode>>,
    live_contexts: usize,
    live_images: usize,
    next_context: u64,
    next_image: u64,
}

impl Bus {
    fn take_fault(&mut self, op: Operation) -> SdkResult<()> {
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }
}

/// Simulated capture SDK.
///
/// Cloning shares the simulated bus.
#[derive(Clone)]
pub struct SimDriver {
    bus: Arc<Mutex<Bus>>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimDriver {
    pub fn new(config: SimConfig) -> Self {
        let cameras = config
            .cameras
            .into_iter()
            .enumerate()
            .map(|(i, c)| SimCamera::new(i, c))
            .collect();
        Self {
            bus: Arc::new(Mutex::new(Bus {
                cameras,
                faults: HashMap::new(),
                live_contexts: 0,
                live_images: 0,
                next_context: 1,
                next_image: 1,
            })),
        }
    }

    /// Make the next call of `op` fail with `code`. Calls queue up.
    pub fn fail_next(&self, op: Operation, code: ErrorCode) {
        self.bus.lock().faults.entry(op).or_default().push_back(code);
    }

    /// Contexts created and not yet destroyed.
    pub fn live_contexts(&self) -> usize {
        self.bus.lock().live_contexts
    }

    /// Images created and not yet destroyed.
    pub fn live_images(&self) -> usize {
        self.bus.lock().live_images
    }

    /// Identity of the camera at `index`, as enumeration reports it.
    pub fn identity(&self, index: usize) -> Option<CameraIdentity> {
        self.bus.lock().cameras.get(index).map(|c| c.identity)
    }
}

impl Driver for SimDriver {
    fn name(&self) -> &str {
        "simulator"
    }

    fn create_context(&self) -> SdkResult<Box<dyn Context>> {
        let mut bus = self.bus.lock();
        bus.take_fault(Operation::CreateContext)?;
        let id = bus.next_context;
        bus.next_context += 1;
        bus.live_contexts += 1;
        Ok(Box::new(SimContext {
            id,
            bus: Arc::clone(&self.bus),
            camera: None,
            capturing: false,
            frame_count: 0,
        }))
    }
}

struct SimContext {
    id: u64,
    bus: Arc<Mutex<Bus>>,
    camera: Option<usize>,
    capturing: bool,
    frame_count: u32,
}

impl SimContext {
    /// Run `f` on the bound camera after consuming any injected fault.
    fn with_camera<T>(
        &mut self,
        op: Operation,
        f: impl FnOnce(&mut SimCamera) -> SdkResult<T>,
    ) -> SdkResult<T> {
        let mut bus = self.bus.lock();
        bus.take_fault(op)?;
        let index = self.camera.ok_or(ErrorCode::NOT_CONNECTED)?;
        let camera = bus.cameras.get_mut(index).ok_or(ErrorCode::NOT_FOUND)?;
        f(camera)
    }

    fn unbind(&mut self, bus: &mut Bus) {
        if let Some(index) = self.camera.take() {
            if let Some(camera) = bus.cameras.get_mut(index) {
                camera.bound_to = None;
            }
        }
        self.capturing = false;
    }
}

impl Context for SimContext {
    fn num_cameras(&mut self) -> SdkResult<u32> {
        let mut bus = self.bus.lock();
        bus.take_fault(Operation::CountCameras)?;
        Ok(bus.cameras.len() as u32)
    }

    fn camera_from_index(&mut self, index: u32) -> SdkResult<CameraIdentity> {
        let mut bus = self.bus.lock();
        bus.take_fault(Operation::IdentifyCamera)?;
        bus.cameras
            .get(index as usize)
            .map(|c| c.identity)
            .ok_or(ErrorCode::NOT_FOUND)
    }

    fn connect(&mut self, identity: &CameraIdentity) -> SdkResult<()> {
        let bus = Arc::clone(&self.bus);
        let mut bus = bus.lock();
        bus.take_fault(Operation::Connect)?;
        let index = bus
            .cameras
            .iter()
            .position(|c| c.identity == *identity)
            .ok_or(ErrorCode::FAILED_GUID)?;
        match bus.cameras[index].bound_to {
            Some(owner) if owner != self.id => return Err(ErrorCode::FAILED_BUS_MASTER_CONNECTION),
            _ => {}
        }
        self.unbind(&mut bus);
        bus.cameras[index].bound_to = Some(self.id);
        self.camera = Some(index);
        Ok(())
    }

    fn disconnect(&mut self) -> SdkResult<()> {
        let bus = Arc::clone(&self.bus);
        let mut bus = bus.lock();
        bus.take_fault(Operation::Disconnect)?;
        self.unbind(&mut bus);
        Ok(())
    }

    fn start_capture(&mut self) -> SdkResult<()> {
        let capturing = self.capturing;
        self.with_camera(Operation::StartCapture, |_| {
            if capturing {
                Err(ErrorCode::ISOCH_ALREADY_STARTED)
            } else {
                Ok(())
            }
        })?;
        self.capturing = true;
        Ok(())
    }

    fn stop_capture(&mut self) -> SdkResult<()> {
        let capturing = self.capturing;
        self.with_camera(Operation::StopCapture, |_| {
            if capturing {
                Ok(())
            } else {
                Err(ErrorCode::ISOCH_NOT_STARTED)
            }
        })?;
        self.capturing = false;
        Ok(())
    }

    fn camera_info(&mut self) -> SdkResult<CameraInfo> {
        self.with_camera(Operation::CameraInfo, |camera| Ok(camera.info()))
    }

    fn create_image(&mut self) -> SdkResult<Box<dyn NativeImage>> {
        let mut bus = self.bus.lock();
        bus.take_fault(Operation::CreateImage)?;
        let id = bus.next_image;
        bus.next_image += 1;
        bus.live_images += 1;
        Ok(Box::new(SimImage {
            id,
            bus: Arc::clone(&self.bus),
            header: ImageHeader::empty(),
            data: Vec::new(),
        }))
    }

    fn retrieve_buffer(&mut self, image: &mut dyn NativeImage) -> SdkResult<()> {
        let image = image
            .as_any_mut()
            .downcast_mut::<SimImage>()
            .ok_or(ErrorCode::INVALID_PARAMETER)?;
        let capturing = self.capturing;
        let frame = self.frame_count;
        self.with_camera(Operation::RetrieveBuffer, |camera| {
            if !capturing {
                return Err(ErrorCode::ISOCH_NOT_STARTED);
            }
            // configs built in code skip validate()
            let (stride, len) = camera
                .config
                .geometry()
                .ok_or(ErrorCode::INVALID_SETTINGS)?;
            image.fill(&camera.config, stride, len, frame);
            Ok(())
        })?;
        self.frame_count = self.frame_count.wrapping_add(1);
        Ok(())
    }

    fn read_register(&mut self, address: u32) -> SdkResult<u32> {
        self.with_camera(Operation::ReadRegister, |camera| {
            if address % 4 != 0 {
                return Err(ErrorCode::INVALID_PARAMETER);
            }
            camera
                .registers
                .get(&address)
                .copied()
                .ok_or(ErrorCode::READ_REGISTER_FAILED)
        })
    }

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()> {
        self.with_camera(Operation::WriteRegister, |camera| {
            if address % 4 != 0 {
                return Err(ErrorCode::INVALID_PARAMETER);
            }
            if camera.read_only.contains(&address) {
                return Err(ErrorCode::WRITE_REGISTER_FAILED);
            }
            camera.registers.insert(address, value);
            Ok(())
        })
    }

    fn property_info(&mut self, property_type: PropertyType) -> SdkResult<PropertyInfo> {
        self.with_camera(Operation::PropertyInfo, |camera| {
            Ok(camera
                .properties
                .get(&property_type)
                .map(|(info, _)| info.clone())
                .unwrap_or_else(|| PropertyInfo::absent(property_type)))
        })
    }

    fn property(&mut self, property_type: PropertyType) -> SdkResult<Property> {
        self.with_camera(Operation::GetProperty, |camera| {
            Ok(camera
                .properties
                .get(&property_type)
                .map(|(_, value)| *value)
                .unwrap_or_else(|| Property::empty(property_type)))
        })
    }

    fn set_property(&mut self, property: &Property) -> SdkResult<()> {
        self.with_camera(Operation::SetProperty, |camera| {
            let (info, value) = camera
                .properties
                .get_mut(&property.property_type)
                .ok_or(ErrorCode::PROPERTY_NOT_PRESENT)?;
            if property.abs_control {
                if !info.abs_val_supported {
                    return Err(ErrorCode::PROPERTY_FAILED);
                }
                if property.abs_value < info.abs_min || property.abs_value > info.abs_max {
                    return Err(ErrorCode::INVALID_PARAMETER);
                }
            } else if property.value_a < info.min || property.value_a > info.max {
                return Err(ErrorCode::INVALID_PARAMETER);
            }
            *value = Property {
                present: true,
                ..*property
            };
            Ok(())
        })
    }

    fn destroy(mut self: Box<Self>) -> SdkResult<()> {
        let bus = Arc::clone(&self.bus);
        let mut bus = bus.lock();
        bus.take_fault(Operation::DestroyContext)?;
        self.unbind(&mut bus);
        bus.live_contexts -= 1;
        Ok(())
    }
}

struct SimImage {
    id: u64,
    bus: Arc<Mutex<Bus>>,
    header: ImageHeader,
    data: Vec<u8>,
}

impl SimImage {
    fn fill(&mut self, camera: &SimCameraConfig, stride: u32, len: u32, frame: u32) {
        let row_bytes = (stride - camera.row_padding) as usize;
        self.data.clear();
        self.data.resize(len as usize, 0);
        if stride > 0 {
            for (row, line) in self.data.chunks_mut(stride as usize).enumerate() {
                for (i, byte) in line[..row_bytes].iter_mut().enumerate() {
                    *byte = (row as u32 + i as u32 + frame) as u8;
                }
            }
        }
        self.header = ImageHeader {
            rows: camera.height,
            cols: camera.width,
            stride,
            data_size: len,
            received_data_size: len,
            format: if camera.color {
                PixelFormat::Rgb8
            } else {
                PixelFormat::Mono8
            },
            bayer_format: 0,
        };
    }
}

impl NativeImage for SimImage {
    fn header(&self) -> ImageHeader {
        self.header
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn destroy(self: Box<Self>) -> SdkResult<()> {
        let mut bus = self.bus.lock();
        bus.take_fault(Operation::DestroyImage)?;
        bus.live_images -= 1;
        tracing::trace!(image = self.id, "simulator released image");
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(driver: &SimDriver) -> Box<dyn Context> {
        let mut ctx = driver.create_context().unwrap();
        let id = ctx.camera_from_index(0).unwrap();
        ctx.connect(&id).unwrap();
        ctx
    }

    #[test]
    fn test_config_from_partial_json() {
        let config =
            SimConfig::from_json(r#"{"cameras":[{"color":true,"width":320,"height":240}]}"#)
                .unwrap();
        assert_eq!(config.cameras.len(), 1);
        assert!(config.cameras[0].color);
        assert_eq!(config.cameras[0].width, 320);
        assert_eq!(config.cameras[0].vendor_name, "Point Grey Research");
    }

    #[test]
    fn test_config_rejects_oversized_frame() {
        let err =
            SimConfig::from_json(r#"{"cameras":[{"color":true,"width":2000000000,"height":2}]}"#)
                .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);

        let err = SimConfig::from_json(
            r#"{"cameras":[{"width":16,"height":16,"row_padding":4294967295}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("camera 0"));
    }

    #[test]
    fn test_oversized_frame_built_in_code_fails_retrieve() {
        let driver = SimDriver::new(SimConfig::empty().with_camera(SimCameraConfig::color(
            2_000_000_000,
            2,
        )));
        let mut ctx = connected(&driver);
        ctx.start_capture().unwrap();
        let mut image = ctx.create_image().unwrap();
        assert_eq!(
            ctx.retrieve_buffer(&mut *image),
            Err(ErrorCode::INVALID_SETTINGS)
        );
        assert_eq!(image.data().len(), 0);
        image.destroy().unwrap();
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        assert!(SimConfig::from_json("{cameras:").is_err());
    }

    #[test]
    fn test_busy_camera_rejected_for_second_context() {
        let driver = SimDriver::default();
        let _first = connected(&driver);
        let mut second = driver.create_context().unwrap();
        let id = second.camera_from_index(0).unwrap();
        assert_eq!(
            second.connect(&id),
            Err(ErrorCode::FAILED_BUS_MASTER_CONNECTION)
        );
    }

    #[test]
    fn test_destroy_releases_camera_binding() {
        let driver = SimDriver::default();
        let first = connected(&driver);
        first.destroy().unwrap();
        let _second = connected(&driver);
        assert_eq!(driver.live_contexts(), 1);
    }

    #[test]
    fn test_stream_state_codes() {
        let driver = SimDriver::default();
        let mut ctx = connected(&driver);
        assert_eq!(ctx.stop_capture(), Err(ErrorCode::ISOCH_NOT_STARTED));
        ctx.start_capture().unwrap();
        assert_eq!(ctx.start_capture(), Err(ErrorCode::ISOCH_ALREADY_STARTED));
        ctx.stop_capture().unwrap();
    }

    #[test]
    fn test_unconnected_calls_report_not_connected() {
        let driver = SimDriver::default();
        let mut ctx = driver.create_context().unwrap();
        assert_eq!(ctx.read_register(0x0610), Err(ErrorCode::NOT_CONNECTED));
        assert_eq!(ctx.camera_info().unwrap_err(), ErrorCode::NOT_CONNECTED);
        assert_eq!(
            ctx.property(PropertyType::Gain).unwrap_err(),
            ErrorCode::NOT_CONNECTED
        );
    }

    #[test]
    fn test_padded_color_frame_geometry() {
        let mut camera = SimCameraConfig::color(4, 2);
        camera.row_padding = 4;
        let driver = SimDriver::new(SimConfig::empty().with_camera(camera));
        let mut ctx = connected(&driver);
        ctx.start_capture().unwrap();
        let mut image = ctx.create_image().unwrap();
        ctx.retrieve_buffer(&mut *image).unwrap();
        let header = image.header();
        assert_eq!(header.stride, 16);
        assert_eq!(image.data().len(), 32);
        assert_eq!(&image.data()[12..16], &[0, 0, 0, 0]);
        image.destroy().unwrap();
        assert_eq!(driver.live_images(), 0);
    }

    #[test]
    fn test_fault_injection_is_one_shot() {
        let driver = SimDriver::default();
        driver.fail_next(Operation::CountCameras, ErrorCode::LOW_LEVEL_FAILURE);
        let mut ctx = driver.create_context().unwrap();
        assert_eq!(ctx.num_cameras(), Err(ErrorCode::LOW_LEVEL_FAILURE));
        assert_eq!(ctx.num_cameras(), Ok(1));
    }

    #[test]
    fn test_read_only_register_rejects_write() {
        let driver = SimDriver::default();
        let mut ctx = connected(&driver);
        assert_eq!(
            ctx.write_register(0x0400, 1),
            Err(ErrorCode::WRITE_REGISTER_FAILED)
        );
        assert_eq!(ctx.read_register(0x0403), Err(ErrorCode::INVALID_PARAMETER));
    }

    #[test]
    fn test_set_absent_property_fails() {
        let driver = SimDriver::default();
        let mut ctx = connected(&driver);
        let result = ctx.set_property(&Property::empty(PropertyType::Pan));
        assert_eq!(result, Err(ErrorCode::PROPERTY_NOT_PRESENT));
        assert!(!ctx.property_info(PropertyType::Pan).unwrap().present);
    }
}
