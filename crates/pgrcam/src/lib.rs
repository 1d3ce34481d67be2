//! Host-callable interface to Point Grey cameras
//!
//! Builds as a shared library that a scripting host (IDL, or anything with
//! a C FFI) loads directly. Two calling conventions are exported:
//!
//! - [`ffi`]: typed `pgr_*` functions returning result structs that carry a
//!   failure category, the SDK status and a message.
//! - [`idl`]: `pgr_idl_*` functions in the `(argc, argv)` form expected by
//!   IDL's `CALL_EXTERNAL`, returning the raw SDK status.
//!
//! Sessions and images cross the boundary as integer tokens managed by
//! [`registry`]; the host never holds a native pointer.

pub mod driver;
pub mod ffi;
pub mod handles;
pub mod idl;
pub mod registry;

pub use handles::HandleTable;
