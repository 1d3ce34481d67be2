//! Capture SDK seam
//!
//! The vendor SDK is reached only through these traits. The FlyCapture2
//! bindings (`flycapture` feature) and the in-process simulator both
//! implement them; the session layer never sees which one it talks to.
//!
//! Every method returns the SDK's raw status on failure. Translation into
//! host-facing errors happens one layer up in [`crate::session`].

use std::any::Any;

use crate::error::SdkResult;
use crate::types::{CameraIdentity, CameraInfo, ImageHeader, Property, PropertyInfo, PropertyType};

/// Entry point of a capture SDK: allocates contexts.
pub trait Driver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Allocate a new SDK context (`fc2CreateContext`).
    fn create_context(&self) -> SdkResult<Box<dyn Context>>;
}

/// One SDK context. Not thread-safe; callers serialize access.
pub trait Context: Send {
    fn num_cameras(&mut self) -> SdkResult<u32>;

    fn camera_from_index(&mut self, index: u32) -> SdkResult<CameraIdentity>;

    fn connect(&mut self, identity: &CameraIdentity) -> SdkResult<()>;

    fn disconnect(&mut self) -> SdkResult<()>;

    fn start_capture(&mut self) -> SdkResult<()>;

    fn stop_capture(&mut self) -> SdkResult<()>;

    fn camera_info(&mut self) -> SdkResult<CameraInfo>;

    /// Allocate an SDK image that later receives frames.
    fn create_image(&mut self) -> SdkResult<Box<dyn NativeImage>>;

    /// Block until the next frame is available and copy it into `image`.
    ///
    /// Implementations reject images they did not create with
    /// `INVALID_PARAMETER`.
    fn retrieve_buffer(&mut self, image: &mut dyn NativeImage) -> SdkResult<()>;

    fn read_register(&mut self, address: u32) -> SdkResult<u32>;

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()>;

    fn property_info(&mut self, property_type: PropertyType) -> SdkResult<PropertyInfo>;

    fn property(&mut self, property_type: PropertyType) -> SdkResult<Property>;

    fn set_property(&mut self, property: &Property) -> SdkResult<()>;

    /// Release the context (`fc2DestroyContext`).
    fn destroy(self: Box<Self>) -> SdkResult<()>;
}

/// SDK-owned image: header plus the pixel buffer it points at.
pub trait NativeImage: Send {
    fn header(&self) -> ImageHeader;

    /// The whole SDK buffer, at least `header().frame_len()` bytes once filled.
    fn data(&self) -> &[u8];

    /// Release the SDK buffer (`fc2DestroyImage`).
    fn destroy(self: Box<Self>) -> SdkResult<()>;

    /// Downcast hook so a context can recover its own image type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
