//! Library-call entry points for IDL `CALL_EXTERNAL`
//!
//! Each function takes `(argc, argv)` where every `argv[i]` points at one
//! host variable, and returns the SDK status as a 16-bit integer (0 on
//! success). Nothing is raised: the caller checks the status.
//!
//! Unlike the typed interface in [`crate::ffi`], state is still passed
//! explicitly. `pgr_idl_open` hands back a session token and an image token
//! that every later call takes as its leading arguments.
//!
//! | status | meaning |
//! |--------|---------|
//! | 0 | success |
//! | -1 | internal failure |
//! | -2 | open found a camera count other than one |
//! | > 0 | SDK status code |

use std::os::raw::{c_int, c_void};

use pgrcam_core::{CaptureError, ErrorCode, Property, PropertyType, Result, Session};
use tracing::warn;

use crate::{driver, registry};

/// IDL `INT`.
type IdlInt = i16;
/// IDL `ULONG`.
type IdlUlong = u32;
/// IDL `ULONG64`, carries handle tokens.
type IdlUlong64 = u64;
/// C `BOOL` as passed by IDL `LONG`.
type IdlBool = i32;

const STATUS_INTERNAL: IdlInt = -1;
const STATUS_CAMERA_COUNT: IdlInt = -2;

/// Argument vector as handed over by the host.
struct Args {
    argc: usize,
    argv: *const *mut c_void,
}

impl Args {
    fn new(argc: c_int, argv: *const *mut c_void, needed: usize) -> Result<Self> {
        let argc = usize::try_from(argc).unwrap_or(0);
        if argv.is_null() || argc < needed {
            return Err(CaptureError::invalid_argument(format!(
                "expected {} arguments, got {}",
                needed, argc
            )));
        }
        Ok(Self { argc, argv })
    }

    fn slot(&self, index: usize) -> Result<*mut c_void> {
        if index >= self.argc {
            return Err(CaptureError::invalid_argument(format!(
                "argument {} out of range",
                index
            )));
        }
        let ptr = unsafe { *self.argv.add(index) };
        if ptr.is_null() {
            return Err(CaptureError::invalid_argument(format!(
                "argument {} is null",
                index
            )));
        }
        Ok(ptr)
    }

    fn read<T: Copy>(&self, index: usize) -> Result<T> {
        let ptr = self.slot(index)? as *const T;
        Ok(unsafe { ptr.read_unaligned() })
    }

    fn write<T>(&self, index: usize, value: T) -> Result<()> {
        let ptr = self.slot(index)? as *mut T;
        unsafe { ptr.write_unaligned(value) };
        Ok(())
    }
}

fn status(result: Result<()>) -> IdlInt {
    match result {
        Ok(()) => 0,
        Err(err) => {
            warn!(error = %err, "library call failed");
            err.code().0 as IdlInt
        }
    }
}

fn call(
    argc: c_int,
    argv: *const *mut c_void,
    needed: usize,
    f: impl FnOnce(&Args) -> Result<()>,
) -> IdlInt {
    pgrcam_ffi_common::catch_panic_or(STATUS_INTERNAL, || {
        status(Args::new(argc, argv, needed).and_then(|args| f(&args)))
    })
}

fn flag(b: bool) -> IdlInt {
    IdlInt::from(b)
}

// ============================================================================
// Open / close / read
// ============================================================================

enum OpenFailure {
    CameraCount(u32),
    Camera(CaptureError),
}

impl From<CaptureError> for OpenFailure {
    fn from(err: CaptureError) -> Self {
        OpenFailure::Camera(err)
    }
}

struct Opened {
    session: u64,
    image: u64,
    cols: u32,
    rows: u32,
}

/// Bring the only attached camera up to streaming and grab one frame.
///
/// Nothing is registered until every step has succeeded; on failure the
/// session and image built so far are released by drop.
fn open_camera() -> std::result::Result<Opened, OpenFailure> {
    let driver = driver::current();
    let mut session = Session::create(driver.as_ref())?;
    let count = session.camera_count()?;
    if count != 1 {
        return Err(OpenFailure::CameraCount(count));
    }
    let identity = session.identify_camera(0)?;
    session.connect(&identity)?;
    session.start_capture()?;
    let mut image = session.create_image()?;
    let header = *session.retrieve_buffer(&mut image)?.header();

    Ok(Opened {
        session: registry::register_session(session),
        image: registry::register_image(image),
        cols: header.cols,
        rows: header.rows,
    })
}

/// Open the single attached camera and start streaming.
///
/// - argv[0]: OUT session token (ULONG64)
/// - argv[1]: OUT image token (ULONG64)
/// - argv[2]: OUT width (INT)
/// - argv[3]: OUT height (INT)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_open(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    pgrcam_ffi_common::catch_panic_or(STATUS_INTERNAL, || {
        // Every output slot is checked up front so nothing is opened that
        // cannot be reported back.
        let args = match Args::new(argc, argv, 4).and_then(|args| {
            (0..4).try_for_each(|i| args.slot(i).map(|_| ()))?;
            Ok(args)
        }) {
            Ok(args) => args,
            Err(err) => return status(Err(err)),
        };
        match open_camera() {
            Ok(opened) => status(
                args.write::<IdlUlong64>(0, opened.session)
                    .and_then(|()| args.write::<IdlUlong64>(1, opened.image))
                    .and_then(|()| args.write::<IdlInt>(2, opened.cols as IdlInt))
                    .and_then(|()| args.write::<IdlInt>(3, opened.rows as IdlInt)),
            ),
            Err(OpenFailure::CameraCount(count)) => {
                warn!(count, "open needs exactly one camera");
                STATUS_CAMERA_COUNT
            }
            Err(OpenFailure::Camera(err)) => status(Err(err)),
        }
    })
}

/// Release an image, stop streaming and destroy the session.
///
/// Every step runs even if an earlier one fails; the first failure is
/// reported.
///
/// - argv[0]: IN session token
/// - argv[1]: IN image token
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_close(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 2, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let image: IdlUlong64 = args.read(1)?;
        let destroyed_image = registry::destroy_image(image);
        let stopped = registry::with_session(session, |s| s.stop_capture());
        let destroyed_session = registry::destroy_session(session);
        destroyed_image.and(stopped).and(destroyed_session)
    })
}

/// Retrieve the next frame into a host array.
///
/// - argv[0]: IN session token
/// - argv[1]: IN image token
/// - argv[2]: OUT pixel data
/// - argv[3]: IN size of argv[2] in bytes (ULONG64)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_read(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 4, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let image: IdlUlong64 = args.read(1)?;
        let out = args.slot(2)? as *mut u8;
        let capacity: IdlUlong64 = args.read(3)?;
        registry::with_frame(session, image, |view| {
            let bytes = view.bytes();
            if (bytes.len() as u64) > capacity {
                return Err(CaptureError::Capture {
                    context: format!(
                        "host array holds {} bytes, frame needs {}",
                        capacity,
                        bytes.len()
                    ),
                    code: ErrorCode::BUFFER_TOO_SMALL,
                });
            }
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len()) };
            Ok(())
        })
    })
}

// ============================================================================
// Registers
// ============================================================================

/// - argv[0]: IN session token
/// - argv[1]: IN register address (ULONG)
/// - argv[2]: OUT register value (ULONG)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_read_register(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 3, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let address: IdlUlong = args.read(1)?;
        let value = registry::with_session(session, |s| s.read_register(address))?;
        args.write::<IdlUlong>(2, value)
    })
}

/// - argv[0]: IN session token
/// - argv[1]: IN register address (ULONG)
/// - argv[2]: IN value (ULONG)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_write_register(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 3, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let address: IdlUlong = args.read(1)?;
        let value: IdlUlong = args.read(2)?;
        registry::with_session(session, |s| s.write_register(address, value))
    })
}

// ============================================================================
// Properties
// ============================================================================

/// - argv[0]: IN session token
/// - argv[1]: IN property type (LONG)
/// - argv[2..=7]: OUT present, autoSupported, manualSupported,
///   onOffSupported, absValSupported, readOutSupported (INT)
/// - argv[8], argv[9]: OUT min, max (ULONG)
/// - argv[10], argv[11]: OUT absMin, absMax (FLOAT)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_property_info(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 12, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let ty = PropertyType::try_from(args.read::<i32>(1)?)?;
        let info = registry::with_session(session, |s| s.property_info(ty))?;
        args.write::<IdlInt>(2, flag(info.present))?;
        args.write::<IdlInt>(3, flag(info.auto_supported))?;
        args.write::<IdlInt>(4, flag(info.manual_supported))?;
        args.write::<IdlInt>(5, flag(info.on_off_supported))?;
        args.write::<IdlInt>(6, flag(info.abs_val_supported))?;
        args.write::<IdlInt>(7, flag(info.read_out_supported))?;
        args.write::<IdlUlong>(8, info.min)?;
        args.write::<IdlUlong>(9, info.max)?;
        args.write::<f32>(10, info.abs_min)?;
        args.write::<f32>(11, info.abs_max)
    })
}

/// - argv[0]: IN session token
/// - argv[1]: IN property type (LONG)
/// - argv[2..=6]: OUT present, absControl, onePush, onOff, autoManualMode (INT)
/// - argv[7], argv[8]: OUT valueA, valueB (ULONG)
/// - argv[9]: OUT absValue (FLOAT)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_read_property(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 10, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let ty = PropertyType::try_from(args.read::<i32>(1)?)?;
        let p = registry::with_session(session, |s| s.property(ty))?;
        args.write::<IdlInt>(2, flag(p.present))?;
        args.write::<IdlInt>(3, flag(p.abs_control))?;
        args.write::<IdlInt>(4, flag(p.one_push))?;
        args.write::<IdlInt>(5, flag(p.on_off))?;
        args.write::<IdlInt>(6, flag(p.auto_manual_mode))?;
        args.write::<IdlUlong>(7, p.value_a)?;
        args.write::<IdlUlong>(8, p.value_b)?;
        args.write::<f32>(9, p.abs_value)
    })
}

/// - argv[0]: IN session token
/// - argv[1]: IN property type (LONG)
/// - argv[2..=5]: IN absControl, onePush, onOff, autoManualMode (LONG)
/// - argv[6], argv[7]: IN valueA, valueB (ULONG)
/// - argv[8]: IN absValue (FLOAT)
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn pgr_idl_write_property(argc: c_int, argv: *const *mut c_void) -> IdlInt {
    call(argc, argv, 9, |args| {
        let session: IdlUlong64 = args.read(0)?;
        let property = Property {
            property_type: PropertyType::try_from(args.read::<i32>(1)?)?,
            present: true,
            abs_control: args.read::<IdlBool>(2)? != 0,
            one_push: args.read::<IdlBool>(3)? != 0,
            on_off: args.read::<IdlBool>(4)? != 0,
            auto_manual_mode: args.read::<IdlBool>(5)? != 0,
            value_a: args.read(6)?,
            value_b: args.read(7)?,
            abs_value: args.read(8)?,
        };
        registry::with_session(session, |s| s.set_property(&property))
    })
}
