//! Camera session and image lifecycle
//!
//! A [`Session`] owns exactly one SDK context and an [`Image`] owns exactly
//! one SDK image buffer. Both release their SDK resource on `destroy` or,
//! failing that, on drop, so an error or panic part way through an operation
//! never leaks what was already allocated.
//!
//! The layer does not pre-check connection state before property, register
//! or capture calls. The SDK is the authority and its rejection is forwarded
//! (a call on an unconnected camera surfaces as [`ErrorKind::State`]). The
//! only checks made here are on argument shape, which never reach the SDK.
//!
//! [`ErrorKind::State`]: crate::error::ErrorKind::State

use tracing::{debug, info, warn};

use crate::error::{CaptureError, ErrorCode, Operation, Result, SdkResultExt};
use crate::frame::FrameView;
use crate::sdk::{Context, Driver, NativeImage};
use crate::types::{
    CameraIdentity, CameraInfo, ImageHeader, Property, PropertyInfo, PropertyType, SessionState,
};

/// One camera connection.
///
/// `Stopped` is a connected camera whose stream has been stopped; it accepts
/// the same calls as `Connected`.
pub struct Session {
    context: Option<Box<dyn Context>>,
    state: SessionState,
    driver: String,
}

impl Session {
    /// Allocate a new SDK context.
    pub fn create(driver: &dyn Driver) -> Result<Self> {
        let context = driver.create_context().during(Operation::CreateContext)?;
        info!(driver = driver.name(), "created capture session");
        Ok(Self {
            context: Some(context),
            state: SessionState::Created,
            driver: driver.name().to_string(),
        })
    }

    /// Release the SDK context.
    ///
    /// The context is gone afterwards even when the SDK reports an error.
    pub fn destroy(mut self) -> Result<()> {
        self.release()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    pub fn camera_count(&mut self) -> Result<u32> {
        let count = self.context()?.num_cameras().during(Operation::CountCameras)?;
        debug!(count, "counted cameras");
        Ok(count)
    }

    pub fn identify_camera(&mut self, index: u32) -> Result<CameraIdentity> {
        let identity = self
            .context()?
            .camera_from_index(index)
            .during(Operation::IdentifyCamera)?;
        debug!(index, ?identity, "identified camera");
        Ok(identity)
    }

    pub fn connect(&mut self, identity: &CameraIdentity) -> Result<()> {
        self.context()?.connect(identity).during(Operation::Connect)?;
        self.state = SessionState::Connected;
        info!(?identity, "connected camera");
        Ok(())
    }

    /// Connect using host-supplied identity words.
    ///
    /// A wrong word count is rejected before the SDK is called, so the
    /// session keeps its current state and stays usable.
    pub fn connect_words(&mut self, words: &[u32]) -> Result<()> {
        let identity = CameraIdentity::from_words(words)?;
        self.connect(&identity)
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.context()?.disconnect().during(Operation::Disconnect)?;
        self.state = SessionState::Created;
        info!("disconnected camera");
        Ok(())
    }

    /// Start streaming. Starting twice is reported by the SDK, not here.
    pub fn start_capture(&mut self) -> Result<()> {
        self.context()?
            .start_capture()
            .during(Operation::StartCapture)?;
        self.state = SessionState::Capturing;
        debug!("capture started");
        Ok(())
    }

    pub fn stop_capture(&mut self) -> Result<()> {
        self.context()?
            .stop_capture()
            .during(Operation::StopCapture)?;
        self.state = SessionState::Stopped;
        debug!("capture stopped");
        Ok(())
    }

    pub fn camera_info(&mut self) -> Result<CameraInfo> {
        self.context()?.camera_info().during(Operation::CameraInfo)
    }

    /// Allocate an image slot that is reused by every retrieve.
    pub fn create_image(&mut self) -> Result<Image> {
        let native = self
            .context()?
            .create_image()
            .during(Operation::CreateImage)?;
        debug!("created image");
        Ok(Image {
            native: Some(native),
        })
    }

    /// Block for the next frame and return a view of it.
    ///
    /// The view borrows `image`, so the buffer cannot be overwritten by
    /// another retrieve while the view is in use.
    pub fn retrieve_buffer<'i>(&mut self, image: &'i mut Image) -> Result<FrameView<'i>> {
        let context = self.context()?;
        let native = image.native_mut()?;
        context
            .retrieve_buffer(&mut **native)
            .during(Operation::RetrieveBuffer)?;
        let native: &'i dyn NativeImage = &**native;
        let header = native.header();
        debug!(
            rows = header.rows,
            cols = header.cols,
            stride = header.stride,
            "retrieved frame"
        );
        FrameView::new(header, native.data())
    }

    /// Unchecked pass-through; address semantics belong to the firmware.
    pub fn read_register(&mut self, address: u32) -> Result<u32> {
        let value = self
            .context()?
            .read_register(address)
            .during(Operation::ReadRegister)?;
        debug!(address = %format_args!("{:#x}", address), value, "read register");
        Ok(value)
    }

    pub fn write_register(&mut self, address: u32, value: u32) -> Result<()> {
        self.context()?
            .write_register(address, value)
            .during(Operation::WriteRegister)?;
        debug!(address = %format_args!("{:#x}", address), value, "wrote register");
        Ok(())
    }

    pub fn property_info(&mut self, property_type: PropertyType) -> Result<PropertyInfo> {
        self.context()?
            .property_info(property_type)
            .during(Operation::PropertyInfo)
    }

    pub fn property(&mut self, property_type: PropertyType) -> Result<Property> {
        self.context()?
            .property(property_type)
            .during(Operation::GetProperty)
    }

    /// Write a whole property value.
    pub fn set_property(&mut self, property: &Property) -> Result<()> {
        self.context()?
            .set_property(property)
            .during(Operation::SetProperty)?;
        debug!(property = ?property.property_type, "set property");
        Ok(())
    }

    fn context(&mut self) -> Result<&mut Box<dyn Context>> {
        self.context.as_mut().ok_or_else(|| CaptureError::Resource {
            context: "session has been destroyed".to_string(),
            code: ErrorCode::NOT_INITIALIZED,
        })
    }

    fn release(&mut self) -> Result<()> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };
        self.state = SessionState::Destroyed;
        context.destroy().during(Operation::DestroyContext)?;
        info!("destroyed capture session");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release session context");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("driver", &self.driver)
            .finish()
    }
}

/// SDK image buffer, filled in place by each retrieve.
pub struct Image {
    native: Option<Box<dyn NativeImage>>,
}

impl Image {
    /// Release the SDK image buffer.
    pub fn destroy(mut self) -> Result<()> {
        self.release()
    }

    /// Header of the last frame retrieved into this image.
    pub fn header(&self) -> ImageHeader {
        self.native
            .as_ref()
            .map(|n| n.header())
            .unwrap_or_else(ImageHeader::empty)
    }

    /// View of the frame currently held, without retrieving a new one.
    pub fn frame(&self) -> Result<FrameView<'_>> {
        match &self.native {
            Some(native) => FrameView::new(native.header(), native.data()),
            None => Err(destroyed_image()),
        }
    }

    fn native_mut(&mut self) -> Result<&mut Box<dyn NativeImage>> {
        self.native.as_mut().ok_or_else(destroyed_image)
    }

    fn release(&mut self) -> Result<()> {
        let Some(native) = self.native.take() else {
            return Ok(());
        };
        native.destroy().during(Operation::DestroyImage)?;
        debug!("destroyed image");
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release image");
        }
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image").field("header", &self.header()).finish()
    }
}

fn destroyed_image() -> CaptureError {
    CaptureError::Resource {
        context: "image has been destroyed".to_string(),
        code: ErrorCode::NOT_INITIALIZED,
    }
}
