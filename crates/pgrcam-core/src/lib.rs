//! Session, frame buffer and property marshalling over a camera capture SDK
//!
//! This crate sits between a host scripting environment and the Point Grey
//! FlyCapture2 SDK. It owns the SDK's resources, converts between host
//! records and SDK values, and translates SDK status codes into typed errors.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌──────────────────────┐
//! │ Host records │───▶│ Session / Image  │───▶│ sdk::Driver/Context  │
//! │ (layout.rs)  │    │ (session.rs)     │    │ fc2.rs or sim.rs     │
//! └──────────────┘    └──────────────────┘    └──────────────────────┘
//!                              │
//!                              ▼
//!                     FrameView / Frame (frame.rs)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pgrcam_core::{PropertyType, Session, SimDriver};
//!
//! # fn main() -> pgrcam_core::Result<()> {
//! let driver = SimDriver::default();
//! let mut session = Session::create(&driver)?;
//! let camera = session.identify_camera(0)?;
//! session.connect(&camera)?;
//! session.start_capture()?;
//!
//! let mut image = session.create_image()?;
//! let frame = session.retrieve_buffer(&mut image)?;
//! assert_eq!(frame.shape().dims(), vec![640, 480]);
//!
//! let gain = session.property(PropertyType::Gain)?;
//! session.set_property(&gain)?;
//!
//! session.stop_capture()?;
//! image.destroy()?;
//! session.destroy()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frame;
pub mod layout;
pub mod logging;
pub mod sdk;
pub mod session;
pub mod sim;
pub mod types;

#[cfg(feature = "flycapture")]
pub mod fc2;

// Re-export main types
pub use error::{CaptureError, ErrorCode, ErrorKind, Operation, Result, SdkResult};
pub use frame::{Frame, FrameShape, FrameView, COLOR_CHANNELS};
pub use layout::{
    ImageDescriptor, IMAGE_DESCRIPTOR_SIZE, LAYOUT_VERSION, PROPERTY_INFO_SIZE, PROPERTY_SIZE,
};
pub use sdk::{Context, Driver, NativeImage};
pub use session::{Image, Session};
pub use sim::{SimCameraConfig, SimConfig, SimDriver};
pub use types::{
    CameraIdentity, CameraInfo, ImageHeader, PixelFormat, Property, PropertyInfo, PropertyType,
    SessionState,
};

#[cfg(feature = "flycapture")]
pub use fc2::FlyCaptureDriver;
