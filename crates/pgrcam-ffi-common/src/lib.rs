//! Common FFI utilities for pgrcam C-compatible interfaces.
//!
//! # Memory Ownership
//!
//! All functions follow Rust's ownership model for FFI:
//! - Functions returning `*mut c_char` transfer ownership to the caller
//! - Callers must use corresponding `free_*` functions to deallocate
//! - NULL pointers are handled safely (no-op for free functions)
//!
//! # Panics
//!
//! A panic must never unwind into the host. Entry points wrap their body in
//! [`catch_panic`] (for [`FfiResult`] returns) or [`catch_panic_or`] (for
//! raw status returns).

use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

/// Convert a Rust string to a C string pointer, with a fallback on failure.
///
/// If the input contains null bytes, returns the fallback string instead.
/// The returned pointer is owned by the caller and must be freed.
///
/// # Example
/// ```
/// use pgrcam_ffi_common::{cstring_new_or_fallback, free_cstring};
///
/// let ptr = cstring_new_or_fallback("hello", "error");
/// unsafe { free_cstring(ptr) };
/// ```
#[inline]
pub fn cstring_new_or_fallback(s: &str, fallback: &'static str) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => CString::new(fallback).unwrap_or_default().into_raw(),
    }
}

/// Convert a Rust string to a C string pointer, using empty string as fallback.
#[inline]
pub fn cstring_new_or_empty(s: &str) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

/// Safely free a C string pointer.
///
/// Does nothing if the pointer is null.
///
/// # Safety
/// The pointer must have been allocated by `CString::into_raw()` or be null.
#[inline]
pub unsafe fn free_cstring(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}

/// Free a boxed slice and its contents.
///
/// Does nothing if the pointer is null or length is zero.
///
/// # Safety
/// The pointer must have been allocated by `Box::into_raw(slice.into_boxed_slice())`.
#[inline]
pub unsafe fn free_boxed_slice<T>(ptr: *mut T, len: usize) {
    if !ptr.is_null() && len > 0 {
        unsafe {
            let _ = Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len));
        }
    }
}

/// Convert a vector to a raw pointer and length.
///
/// Returns null pointer and 0 length for empty vectors.
/// The returned pointer is owned by the caller.
#[inline]
pub fn vec_into_raw<T>(vec: Vec<T>) -> (*mut T, usize) {
    let len = vec.len();
    if len == 0 {
        (ptr::null_mut(), 0)
    } else {
        (Box::into_raw(vec.into_boxed_slice()) as *mut T, len)
    }
}

/// Safely convert a C string pointer to a Rust string reference.
///
/// # Safety
/// The pointer must be valid and null-terminated, or null.
pub unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, &'static str> {
    if ptr.is_null() {
        return Err("null pointer");
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| "invalid UTF-8")
}

/// Borrow a caller-owned byte block.
///
/// A null pointer is only accepted with length 0.
///
/// # Safety
/// `ptr` must point to `len` readable bytes, or be null.
pub unsafe fn bytes_from_raw<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8], &'static str> {
    if ptr.is_null() {
        return if len == 0 { Ok(&[]) } else { Err("null pointer") };
    }
    Ok(unsafe { slice::from_raw_parts(ptr, len) })
}

/// Mutably borrow a caller-owned byte block.
///
/// # Safety
/// `ptr` must point to `len` writable bytes, or be null.
pub unsafe fn bytes_from_raw_mut<'a>(
    ptr: *mut u8,
    len: usize,
) -> Result<&'a mut [u8], &'static str> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&mut [])
        } else {
            Err("null pointer")
        };
    }
    Ok(unsafe { slice::from_raw_parts_mut(ptr, len) })
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Trait for FFI result types with standardized error handling.
///
/// Every result carries a failure category (`kind`) and the underlying
/// numeric status (`code`) next to the message.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// pub struct MyResultC {
///     pub success: bool,
///     pub kind: i32,
///     pub code: i32,
///     pub error_msg: *mut c_char,
///     pub value: u32,
/// }
///
/// impl FfiResult for MyResultC {
///     const ERROR_FALLBACK: &'static str = "unknown error";
///     const PANIC_KIND: i32 = 1;
///
///     fn error_fields(kind: i32, code: i32, error_msg: *mut c_char) -> Self {
///         Self { success: false, kind, code, error_msg, value: 0 }
///     }
/// }
///
/// let result = MyResultC::error(3, 7, "bad argument");
/// ```
pub trait FfiResult: Sized {
    /// Fallback message used when the error message contains null bytes.
    const ERROR_FALLBACK: &'static str;

    /// Category reported when the entry point panicked.
    const PANIC_KIND: i32;

    /// Status reported when the entry point panicked.
    const PANIC_CODE: i32 = -1;

    /// Construct the result struct in its error state.
    fn error_fields(kind: i32, code: i32, error_msg: *mut c_char) -> Self;

    /// Create an error result with the given message.
    #[inline]
    fn error(kind: i32, code: i32, msg: &str) -> Self {
        let error_msg = cstring_new_or_fallback(msg, Self::ERROR_FALLBACK);
        Self::error_fields(kind, code, error_msg)
    }

    /// Error result for a caught panic.
    fn panicked(msg: &str) -> Self {
        Self::error(
            Self::PANIC_KIND,
            Self::PANIC_CODE,
            &format!("internal panic: {}", msg),
        )
    }
}

/// Run an entry point body, turning a panic into an error result.
pub fn catch_panic<R: FfiResult>(f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => R::panicked(&panic_message(payload.as_ref())),
    }
}

/// Run an entry point body, returning `fallback` if it panics.
pub fn catch_panic_or<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(fallback)
}

/// Generate a version function that returns a static C string.
///
/// # Example
/// ```ignore
/// pgrcam_ffi_common::define_version_fn!(my_lib_version);
/// // Expands to:
/// // #[no_mangle]
/// // pub extern "C" fn my_lib_version() -> *const c_char {
/// //     concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
/// // }
/// ```
#[macro_export]
macro_rules! define_version_fn {
    ($fn_name:ident) => {
        #[no_mangle]
        pub extern "C" fn $fn_name() -> *const std::os::raw::c_char {
            concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const std::os::raw::c_char
        }
    };
}

/// Generate a string free function.
///
/// # Example
/// ```ignore
/// pgrcam_ffi_common::define_string_free!(my_string_free);
/// ```
#[macro_export]
macro_rules! define_string_free {
    ($fn_name:ident) => {
        #[no_mangle]
        #[allow(clippy::not_unsafe_ptr_arg_deref)]
        pub extern "C" fn $fn_name(s: *mut std::os::raw::c_char) {
            unsafe { $crate::free_cstring(s) };
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResult {
        success: bool,
        kind: i32,
        code: i32,
        error_msg: *mut c_char,
    }

    impl FfiResult for TestResult {
        const ERROR_FALLBACK: &'static str = "test error";
        const PANIC_KIND: i32 = 99;

        fn error_fields(kind: i32, code: i32, error_msg: *mut c_char) -> Self {
            Self {
                success: false,
                kind,
                code,
                error_msg,
            }
        }
    }

    fn take_msg(ptr: *mut c_char) -> String {
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        unsafe { free_cstring(ptr) };
        s
    }

    #[test]
    fn test_cstring_new_or_fallback() {
        let ptr = cstring_new_or_fallback("hello", "fallback");
        assert!(!ptr.is_null());
        assert_eq!(take_msg(ptr), "hello");
    }

    #[test]
    fn test_cstring_with_null_bytes_uses_fallback() {
        let ptr = cstring_new_or_fallback("hel\0lo", "fallback");
        assert_eq!(take_msg(ptr), "fallback");
    }

    #[test]
    fn test_free_cstring_null_is_safe() {
        unsafe { free_cstring(ptr::null_mut()) };
    }

    #[test]
    fn test_vec_into_raw_empty() {
        let (ptr, len): (*mut u8, usize) = vec_into_raw(Vec::new());
        assert!(ptr.is_null());
        assert_eq!(len, 0);
        unsafe { free_boxed_slice(ptr, len) };
    }

    #[test]
    fn test_vec_into_raw_non_empty() {
        let (ptr, len) = vec_into_raw(vec![1u8, 2, 3]);
        assert!(!ptr.is_null());
        assert_eq!(len, 3);
        assert_eq!(unsafe { slice::from_raw_parts(ptr, len) }, &[1, 2, 3]);
        unsafe { free_boxed_slice(ptr, len) };
    }

    #[test]
    fn test_cstr_to_str_null() {
        let result = unsafe { cstr_to_str(ptr::null()) };
        assert_eq!(result.unwrap_err(), "null pointer");
    }

    #[test]
    fn test_cstr_to_str_valid() {
        let s = CString::new("test").unwrap();
        let result = unsafe { cstr_to_str(s.as_ptr()) };
        assert_eq!(result.unwrap(), "test");
    }

    #[test]
    fn test_bytes_from_raw_null_only_when_empty() {
        assert!(unsafe { bytes_from_raw(ptr::null(), 0) }.unwrap().is_empty());
        assert!(unsafe { bytes_from_raw(ptr::null(), 4) }.is_err());
        assert!(unsafe { bytes_from_raw_mut(ptr::null_mut(), 4) }.is_err());
    }

    #[test]
    fn test_bytes_from_raw_mut_writes_through() {
        let mut buf = [0u8; 4];
        let slice = unsafe { bytes_from_raw_mut(buf.as_mut_ptr(), buf.len()) }.unwrap();
        slice[2] = 9;
        assert_eq!(buf, [0, 0, 9, 0]);
    }

    #[test]
    fn test_ffi_result_error_carries_kind_and_code() {
        let result = TestResult::error(3, 7, "bad argument");
        assert!(!result.success);
        assert_eq!(result.kind, 3);
        assert_eq!(result.code, 7);
        assert_eq!(take_msg(result.error_msg), "bad argument");
    }

    #[test]
    fn test_catch_panic_converts_panic() {
        let result: TestResult = catch_panic(|| panic!("boom"));
        assert_eq!(result.kind, 99);
        assert_eq!(result.code, -1);
        assert!(take_msg(result.error_msg).contains("boom"));
    }

    #[test]
    fn test_catch_panic_or_passes_value_through() {
        assert_eq!(catch_panic_or(-1i16, || 0), 0);
        assert_eq!(catch_panic_or(-1i16, || panic!("boom")), -1);
    }
}
