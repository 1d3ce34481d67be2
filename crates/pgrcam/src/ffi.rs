//! C-compatible FFI interface for camera sessions
//!
//! Every entry point follows the message-block convention: it returns a
//! `#[repr(C)]` result whose `success` flag is false on failure, with
//! `kind` set to the failure category, `code` to the SDK status and
//! `error_msg` to a description.
//!
//! # Memory Ownership Rules
//!
//! - Sessions are `u64` tokens. `pgr_session_destroy()` releases one.
//! - Images are 48-byte descriptor blocks allocated by the caller, filled by
//!   `pgr_image_create()` and released by `pgr_image_destroy()`.
//! - `error_msg` strings are owned by the caller; free with `pgr_string_free()`.
//! - `PgrFrameC::data` is a copy owned by the caller; free the whole result
//!   with `pgr_frame_free()`. It stays valid across later retrieves.
//! - `PgrCameraInfoC` strings are freed with `pgr_camera_info_free()`.
//!
//! # Failure categories (`kind`)
//!
//! | kind | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | resource (allocation, release, invalid handle, internal panic) |
//! | 2 | connection |
//! | 3 | invalid argument |
//! | 4 | not found |
//! | 5 | state (camera not connected) |
//! | 6 | capture |
//! | 7 | property |
//! | 8 | register |
//!
//! # Thread Safety
//!
//! Calls on one session are serialized. Independent sessions may be used
//! from different threads concurrently.

use std::os::raw::c_char;
use std::ptr;

use pgrcam_core::layout::{self, ImageDescriptor};
use pgrcam_core::{
    CameraInfo, CaptureError, ErrorCode, ErrorKind, Frame, ImageHeader, PropertyType, Result,
    IMAGE_DESCRIPTOR_SIZE, PROPERTY_INFO_SIZE, PROPERTY_SIZE,
};
use pgrcam_ffi_common::{
    bytes_from_raw, bytes_from_raw_mut, catch_panic, cstr_to_str, cstring_new_or_empty,
    cstring_new_or_fallback, free_boxed_slice, free_cstring, vec_into_raw, FfiResult,
};

use crate::{driver, registry};

const ERROR_FALLBACK: &str = "unknown error";
const MAX_CONFIG_LEN: usize = 1_000_000;

/// Outcome of a call with no payload
#[repr(C)]
pub struct PgrStatusC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    /// Error message if success is false (owned, must be freed)
    pub error_msg: *mut c_char,
}

/// Outcome of `pgr_session_create`
#[repr(C)]
pub struct PgrSessionC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    pub error_msg: *mut c_char,
    /// Session token, 0 on failure
    pub session: u64,
}

/// Outcome of calls returning one 32-bit value
#[repr(C)]
pub struct PgrValueC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    pub error_msg: *mut c_char,
    pub value: u32,
}

/// Outcome of `pgr_camera_identify`
#[repr(C)]
pub struct PgrIdentityC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    pub error_msg: *mut c_char,
    /// Opaque camera identity
    pub words: [u32; 4],
}

/// Outcome of `pgr_camera_info`
#[repr(C)]
pub struct PgrCameraInfoC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    pub error_msg: *mut c_char,
    pub serial_number: u32,
    pub is_color: bool,
    pub model_name: *mut c_char,
    pub vendor_name: *mut c_char,
    pub sensor_info: *mut c_char,
    pub sensor_resolution: *mut c_char,
    pub driver_name: *mut c_char,
    pub firmware_version: *mut c_char,
}

/// One frame copied out of the SDK buffer
#[repr(C)]
pub struct PgrFrameC {
    pub success: bool,
    pub kind: i32,
    pub code: i32,
    pub error_msg: *mut c_char,
    /// Pixel bytes, exactly `rows * stride` (owned, must be freed)
    pub data: *mut u8,
    pub data_len: usize,
    /// 2 for mono, 3 for color
    pub ndim: u32,
    /// Host (column-major) dimensions: `[cols, rows, 0]` or `[3, cols, rows]`
    pub dims: [usize; 3],
    pub rows: u32,
    pub cols: u32,
    pub stride: u32,
    pub pixel_format: u32,
}

macro_rules! impl_ffi_result {
    ($ty:ty, { $($field:ident: $value:expr),* $(,)? }) => {
        impl FfiResult for $ty {
            const ERROR_FALLBACK: &'static str = ERROR_FALLBACK;
            const PANIC_KIND: i32 = ErrorKind::Resource as i32;

            fn error_fields(kind: i32, code: i32, error_msg: *mut c_char) -> Self {
                Self {
                    success: false,
                    kind,
                    code,
                    error_msg,
                    $($field: $value),*
                }
            }
        }
    };
}

impl_ffi_result!(PgrStatusC, {});
impl_ffi_result!(PgrSessionC, { session: 0 });
impl_ffi_result!(PgrValueC, { value: 0 });
impl_ffi_result!(PgrIdentityC, { words: [0; 4] });
impl_ffi_result!(PgrCameraInfoC, {
    serial_number: 0,
    is_color: false,
    model_name: ptr::null_mut(),
    vendor_name: ptr::null_mut(),
    sensor_info: ptr::null_mut(),
    sensor_resolution: ptr::null_mut(),
    driver_name: ptr::null_mut(),
    firmware_version: ptr::null_mut(),
});
impl_ffi_result!(PgrFrameC, {
    data: ptr::null_mut(),
    data_len: 0,
    ndim: 0,
    dims: [0; 3],
    rows: 0,
    cols: 0,
    stride: 0,
    pixel_format: 0,
});

fn fail<R: FfiResult>(err: &CaptureError) -> R {
    R::error(err.kind() as i32, err.code().0, &err.to_string())
}

/// Convert a result, building the success value with `ok`.
fn respond<T, R: FfiResult>(result: Result<T>, ok: impl FnOnce(T) -> R) -> R {
    match result {
        Ok(value) => ok(value),
        Err(err) => {
            tracing::debug!(error = %err, "call failed");
            fail(&err)
        }
    }
}

impl PgrStatusC {
    fn ok() -> Self {
        Self {
            success: true,
            kind: 0,
            code: 0,
            error_msg: ptr::null_mut(),
        }
    }

    fn from_result(result: Result<()>) -> Self {
        respond(result, |()| Self::ok())
    }
}

impl PgrValueC {
    fn from_result(result: Result<u32>) -> Self {
        respond(result, |value| Self {
            success: true,
            kind: 0,
            code: 0,
            error_msg: ptr::null_mut(),
            value,
        })
    }
}

impl PgrCameraInfoC {
    fn success(info: CameraInfo) -> Self {
        Self {
            success: true,
            kind: 0,
            code: 0,
            error_msg: ptr::null_mut(),
            serial_number: info.serial_number,
            is_color: info.is_color,
            model_name: cstring_new_or_empty(&info.model_name),
            vendor_name: cstring_new_or_empty(&info.vendor_name),
            sensor_info: cstring_new_or_empty(&info.sensor_info),
            sensor_resolution: cstring_new_or_empty(&info.sensor_resolution),
            driver_name: cstring_new_or_empty(&info.driver_name),
            firmware_version: cstring_new_or_empty(&info.firmware_version),
        }
    }
}

fn bad_pointer(what: &str, reason: &str) -> CaptureError {
    CaptureError::invalid_argument(format!("{}: {}", what, reason))
}

/// Caller-owned input block.
unsafe fn record_in<'a>(what: &str, ptr: *const u8, len: usize) -> Result<&'a [u8]> {
    unsafe { bytes_from_raw(ptr, len) }.map_err(|reason| bad_pointer(what, reason))
}

/// Caller-owned output block.
unsafe fn record_out<'a>(what: &str, ptr: *mut u8, len: usize) -> Result<&'a mut [u8]> {
    unsafe { bytes_from_raw_mut(ptr, len) }.map_err(|reason| bad_pointer(what, reason))
}

// ============================================================================
// Library
// ============================================================================

pgrcam_ffi_common::define_version_fn!(pgrcam_version);
pgrcam_ffi_common::define_string_free!(pgr_string_free);

/// Install a stderr log subscriber honoring `RUST_LOG`. Safe to call twice.
#[no_mangle]
pub extern "C" fn pgr_init_logging() {
    pgrcam_core::logging::init();
}

/// Description of an SDK status code.
///
/// Caller owns the returned string and must free it with `pgr_string_free`.
#[no_mangle]
pub extern "C" fn pgr_error_description(code: i32) -> *mut c_char {
    cstring_new_or_fallback(&describe(ErrorCode(code)), ERROR_FALLBACK)
}

#[cfg(feature = "flycapture")]
fn describe(code: ErrorCode) -> String {
    pgrcam_core::fc2::sdk_description(code)
}

#[cfg(not(feature = "flycapture"))]
fn describe(code: ErrorCode) -> String {
    code.description().to_string()
}

/// Size in bytes of an image descriptor block.
#[no_mangle]
pub extern "C" fn pgr_image_descriptor_size() -> usize {
    IMAGE_DESCRIPTOR_SIZE
}

/// Size in bytes of a property descriptor record.
#[no_mangle]
pub extern "C" fn pgr_property_info_size() -> usize {
    PROPERTY_INFO_SIZE
}

/// Size in bytes of a property value record.
#[no_mangle]
pub extern "C" fn pgr_property_size() -> usize {
    PROPERTY_SIZE
}

/// Replace the driver for new sessions with a simulator configured from
/// JSON. Existing sessions are unaffected.
///
/// # Safety
/// `config_json` must be a valid null-terminated string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_simulator_configure(config_json: *const c_char) -> PgrStatusC {
    catch_panic(|| {
        let json = match unsafe { cstr_to_str(config_json) } {
            Ok(s) if s.len() <= MAX_CONFIG_LEN => s,
            Ok(_) => return fail(&bad_pointer("config", "too long")),
            Err(reason) => return fail(&bad_pointer("config", reason)),
        };
        PgrStatusC::from_result(driver::install_simulator(json).map(|_| ()))
    })
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Create a session. The returned token must be released with
/// `pgr_session_destroy`.
#[no_mangle]
pub extern "C" fn pgr_session_create() -> PgrSessionC {
    catch_panic(|| {
        respond(registry::create_session(), |session| PgrSessionC {
            success: true,
            kind: 0,
            code: 0,
            error_msg: ptr::null_mut(),
            session,
        })
    })
}

/// Destroy a session. Fails with a resource error on an unknown or
/// already-destroyed token.
#[no_mangle]
pub extern "C" fn pgr_session_destroy(session: u64) -> PgrStatusC {
    catch_panic(|| PgrStatusC::from_result(registry::destroy_session(session)))
}

/// Current session state (0 created, 1 connected, 2 capturing, 3 stopped),
/// or -1 for an unknown token.
#[no_mangle]
pub extern "C" fn pgr_session_state(session: u64) -> i32 {
    pgrcam_ffi_common::catch_panic_or(-1, || {
        registry::session_state(session)
            .map(|state| state as i32)
            .unwrap_or(-1)
    })
}

#[no_mangle]
pub extern "C" fn pgr_camera_count(session: u64) -> PgrValueC {
    catch_panic(|| {
        PgrValueC::from_result(registry::with_session(session, |s| s.camera_count()))
    })
}

/// Identity of the camera at `index` (the host usually passes 0).
#[no_mangle]
pub extern "C" fn pgr_camera_identify(session: u64, index: u32) -> PgrIdentityC {
    catch_panic(|| {
        respond(
            registry::with_session(session, |s| s.identify_camera(index)),
            |identity| PgrIdentityC {
                success: true,
                kind: 0,
                code: 0,
                error_msg: ptr::null_mut(),
                words: *identity.words(),
            },
        )
    })
}

/// Connect to a camera by identity.
///
/// `words_len` must be exactly 4. Any other length is an invalid-argument
/// failure and the session is left as it was.
///
/// # Safety
/// `words` must point to `words_len` readable `u32`s.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_camera_connect(
    session: u64,
    words: *const u32,
    words_len: usize,
) -> PgrStatusC {
    catch_panic(|| {
        if words.is_null() {
            return fail(&bad_pointer("identity", "null pointer"));
        }
        let words = unsafe { std::slice::from_raw_parts(words, words_len) };
        PgrStatusC::from_result(registry::with_session(session, |s| s.connect_words(words)))
    })
}

#[no_mangle]
pub extern "C" fn pgr_camera_disconnect(session: u64) -> PgrStatusC {
    catch_panic(|| PgrStatusC::from_result(registry::with_session(session, |s| s.disconnect())))
}

/// Static camera metadata. Free with `pgr_camera_info_free`.
#[no_mangle]
pub extern "C" fn pgr_camera_info(session: u64) -> PgrCameraInfoC {
    catch_panic(|| {
        respond(
            registry::with_session(session, |s| s.camera_info()),
            PgrCameraInfoC::success,
        )
    })
}

/// Free a `PgrCameraInfoC` and its strings.
#[no_mangle]
pub extern "C" fn pgr_camera_info_free(info: PgrCameraInfoC) {
    unsafe {
        free_cstring(info.error_msg);
        free_cstring(info.model_name);
        free_cstring(info.vendor_name);
        free_cstring(info.sensor_info);
        free_cstring(info.sensor_resolution);
        free_cstring(info.driver_name);
        free_cstring(info.firmware_version);
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Start streaming. Starting twice is reported by the SDK as a connection
/// failure.
#[no_mangle]
pub extern "C" fn pgr_capture_start(session: u64) -> PgrStatusC {
    catch_panic(|| PgrStatusC::from_result(registry::with_session(session, |s| s.start_capture())))
}

#[no_mangle]
pub extern "C" fn pgr_capture_stop(session: u64) -> PgrStatusC {
    catch_panic(|| PgrStatusC::from_result(registry::with_session(session, |s| s.stop_capture())))
}

/// Allocate an image and write its descriptor into the caller's block.
///
/// `descriptor_len` must equal `pgr_image_descriptor_size()`. The size is
/// checked before anything is allocated.
///
/// # Safety
/// `descriptor` must point to `descriptor_len` writable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_image_create(
    session: u64,
    descriptor: *mut u8,
    descriptor_len: usize,
) -> PgrStatusC {
    catch_panic(|| {
        let result = unsafe { record_out("image descriptor", descriptor, descriptor_len) }
            .and_then(|out| create_image_into(session, out));
        PgrStatusC::from_result(result)
    })
}

fn create_image_into(session: u64, out: &mut [u8]) -> Result<()> {
    if out.len() != IMAGE_DESCRIPTOR_SIZE {
        return Err(CaptureError::invalid_argument(format!(
            "image descriptor: expected {} bytes, got {}",
            IMAGE_DESCRIPTOR_SIZE,
            out.len()
        )));
    }
    let token = registry::create_image(session)?;
    let descriptor = ImageDescriptor {
        token,
        header: ImageHeader::empty(),
    };
    out.copy_from_slice(&descriptor.encode());
    Ok(())
}

/// Release the image named by a descriptor block.
///
/// Fails with an invalid-argument error when `descriptor_len` is not
/// exactly the descriptor size or the block was not produced by
/// `pgr_image_create`.
///
/// # Safety
/// `descriptor` must point to `descriptor_len` readable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_image_destroy(descriptor: *const u8, descriptor_len: usize) -> PgrStatusC {
    catch_panic(|| {
        let result = unsafe { record_in("image descriptor", descriptor, descriptor_len) }
            .and_then(ImageDescriptor::decode)
            .and_then(|decoded| registry::destroy_image(decoded.token));
        PgrStatusC::from_result(result)
    })
}

/// Block for the next frame and copy it out.
///
/// The descriptor block is updated in place with the new frame geometry.
/// The returned pixel data is a private copy of exactly `rows * stride`
/// bytes, valid until `pgr_frame_free`.
///
/// # Safety
/// `descriptor` must point to `descriptor_len` writable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_image_retrieve(
    session: u64,
    descriptor: *mut u8,
    descriptor_len: usize,
) -> PgrFrameC {
    catch_panic(|| {
        let frame = unsafe { record_out("image descriptor", descriptor, descriptor_len) }
            .and_then(|block| retrieve_into(session, block));
        respond(frame, |frame| {
            let header = *frame.header();
            let shape = frame.shape();
            let mut dims = [0usize; 3];
            for (slot, dim) in dims.iter_mut().zip(shape.dims()) {
                *slot = dim;
            }
            let (data, data_len) = vec_into_raw(frame.into_bytes());
            PgrFrameC {
                success: true,
                kind: 0,
                code: 0,
                error_msg: ptr::null_mut(),
                data,
                data_len,
                ndim: shape.ndim() as u32,
                dims,
                rows: header.rows,
                cols: header.cols,
                stride: header.stride,
                pixel_format: header.format.as_raw(),
            }
        })
    })
}

fn retrieve_into(session: u64, block: &mut [u8]) -> Result<Frame> {
    let decoded = ImageDescriptor::decode(block)?;
    let frame = registry::retrieve(session, decoded.token)?;
    ImageDescriptor {
        token: decoded.token,
        header: *frame.header(),
    }
    .encode_into(block)?;
    Ok(frame)
}

/// Free a `PgrFrameC` and its pixel data.
#[no_mangle]
pub extern "C" fn pgr_frame_free(frame: PgrFrameC) {
    unsafe {
        free_cstring(frame.error_msg);
        free_boxed_slice(frame.data, frame.data_len);
    }
}

// ============================================================================
// Registers
// ============================================================================

#[no_mangle]
pub extern "C" fn pgr_register_read(session: u64, address: u32) -> PgrValueC {
    catch_panic(|| {
        PgrValueC::from_result(registry::with_session(session, |s| s.read_register(address)))
    })
}

#[no_mangle]
pub extern "C" fn pgr_register_write(session: u64, address: u32, value: u32) -> PgrStatusC {
    catch_panic(|| {
        PgrStatusC::from_result(registry::with_session(session, |s| {
            s.write_register(address, value)
        }))
    })
}

// ============================================================================
// Properties
// ============================================================================

/// Write the descriptor of property `property_type` into a caller record of
/// exactly `pgr_property_info_size()` bytes.
///
/// # Safety
/// `out` must point to `out_len` writable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_property_info(
    session: u64,
    property_type: i32,
    out: *mut u8,
    out_len: usize,
) -> PgrStatusC {
    catch_panic(|| {
        let result = unsafe { record_out("property descriptor", out, out_len) }
            .and_then(|out| property_info_into(session, property_type, out));
        PgrStatusC::from_result(result)
    })
}

fn property_info_into(session: u64, property_type: i32, out: &mut [u8]) -> Result<()> {
    let ty = PropertyType::try_from(property_type)?;
    let info = registry::with_session(session, |s| s.property_info(ty))?;
    layout::write_record(
        "property descriptor",
        &layout::encode_property_info(&info),
        out,
    )
}

/// Write the current value of property `property_type` into a caller record
/// of exactly `pgr_property_size()` bytes.
///
/// # Safety
/// `out` must point to `out_len` writable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_property_get(
    session: u64,
    property_type: i32,
    out: *mut u8,
    out_len: usize,
) -> PgrStatusC {
    catch_panic(|| {
        let result = unsafe { record_out("property value", out, out_len) }
            .and_then(|out| property_into(session, property_type, out));
        PgrStatusC::from_result(result)
    })
}

fn property_into(session: u64, property_type: i32, out: &mut [u8]) -> Result<()> {
    let ty = PropertyType::try_from(property_type)?;
    let property = registry::with_session(session, |s| s.property(ty))?;
    layout::write_record("property value", &layout::encode_property(&property), out)
}

/// Write a whole property value record.
///
/// The record's type tag is validated before the SDK is called.
///
/// # Safety
/// `record` must point to `record_len` readable bytes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_property_set(
    session: u64,
    record: *const u8,
    record_len: usize,
) -> PgrStatusC {
    catch_panic(|| {
        let result = unsafe { record_in("property value", record, record_len) }
            .and_then(layout::decode_property)
            .and_then(|property| registry::with_session(session, |s| s.set_property(&property)));
        PgrStatusC::from_result(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn take_msg(ptr: *mut c_char) -> String {
        let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { free_cstring(ptr) };
        s
    }

    #[test]
    fn test_fail_carries_kind_and_code() {
        let err = CaptureError::from_sdk(
            pgrcam_core::Operation::ReadRegister,
            ErrorCode::READ_REGISTER_FAILED,
        );
        let result: PgrValueC = fail(&err);
        assert!(!result.success);
        assert_eq!(result.kind, ErrorKind::Register as i32);
        assert_eq!(result.code, ErrorCode::READ_REGISTER_FAILED.0);
        assert!(take_msg(result.error_msg).contains("read register"));
    }

    #[test]
    fn test_panic_is_reported_as_resource_error() {
        let result: PgrStatusC = catch_panic(|| panic!("bad state"));
        assert!(!result.success);
        assert_eq!(result.kind, ErrorKind::Resource as i32);
        assert_eq!(result.code, -1);
        assert!(take_msg(result.error_msg).contains("bad state"));
    }

    #[test]
    fn test_error_description_is_owned_string() {
        let ptr = pgr_error_description(ErrorCode::TIMEOUT.0);
        assert!(!take_msg(ptr).is_empty());
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(pgr_image_descriptor_size(), 48);
        assert_eq!(pgr_property_info_size(), 1104);
        assert_eq!(pgr_property_size(), 68);
    }

    #[test]
    fn test_version_is_package_version() {
        let version = unsafe { CStr::from_ptr(pgrcam_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
