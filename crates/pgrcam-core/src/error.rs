//! Error translation for capture SDK calls
//!
//! Every SDK call yields a numeric status ([`ErrorCode`]). The session layer
//! turns a failing status into a [`CaptureError`] whose variant depends on
//! which [`Operation`] failed, so hosts can tell a bad connection from a
//! rejected property write without decoding vendor numbers themselves.

use std::fmt;

use thiserror::Error;

/// Numeric status returned by the capture SDK.
///
/// Values follow the FlyCapture2 `fc2Error` enumeration so codes reported by
/// the real SDK and by the simulator are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const UNDEFINED: Self = Self(-1);
    pub const OK: Self = Self(0);
    pub const FAILED: Self = Self(1);
    pub const NOT_IMPLEMENTED: Self = Self(2);
    pub const FAILED_BUS_MASTER_CONNECTION: Self = Self(3);
    pub const NOT_CONNECTED: Self = Self(4);
    pub const INIT_FAILED: Self = Self(5);
    pub const NOT_INITIALIZED: Self = Self(6);
    pub const INVALID_PARAMETER: Self = Self(7);
    pub const INVALID_SETTINGS: Self = Self(8);
    pub const INVALID_BUS_MANAGER: Self = Self(9);
    pub const MEMORY_ALLOCATION_FAILED: Self = Self(10);
    pub const LOW_LEVEL_FAILURE: Self = Self(11);
    pub const NOT_FOUND: Self = Self(12);
    pub const FAILED_GUID: Self = Self(13);
    pub const INVALID_PACKET_SIZE: Self = Self(14);
    pub const INVALID_MODE: Self = Self(15);
    pub const NOT_IN_FORMAT7: Self = Self(16);
    pub const NOT_SUPPORTED: Self = Self(17);
    pub const TIMEOUT: Self = Self(18);
    pub const BUS_MASTER_FAILED: Self = Self(19);
    pub const INVALID_GENERATION: Self = Self(20);
    pub const LUT_FAILED: Self = Self(21);
    pub const IIDC_FAILED: Self = Self(22);
    pub const STROBE_FAILED: Self = Self(23);
    pub const TRIGGER_FAILED: Self = Self(24);
    pub const PROPERTY_FAILED: Self = Self(25);
    pub const PROPERTY_NOT_PRESENT: Self = Self(26);
    pub const REGISTER_FAILED: Self = Self(27);
    pub const READ_REGISTER_FAILED: Self = Self(28);
    pub const WRITE_REGISTER_FAILED: Self = Self(29);
    pub const ISOCH_FAILED: Self = Self(30);
    pub const ISOCH_ALREADY_STARTED: Self = Self(31);
    pub const ISOCH_NOT_STARTED: Self = Self(32);
    pub const ISOCH_START_FAILED: Self = Self(33);
    pub const ISOCH_RETRIEVE_BUFFER_FAILED: Self = Self(34);
    pub const ISOCH_STOP_FAILED: Self = Self(35);
    pub const ISOCH_SYNC_FAILED: Self = Self(36);
    pub const ISOCH_BANDWIDTH_EXCEEDED: Self = Self(37);
    pub const IMAGE_CONVERSION_FAILED: Self = Self(38);
    pub const IMAGE_LIBRARY_FAILURE: Self = Self(39);
    pub const BUFFER_TOO_SMALL: Self = Self(40);
    pub const IMAGE_CONSISTENCY_ERROR: Self = Self(41);
    pub const INCOMPATIBLE_DRIVER: Self = Self(42);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Convert a raw status into `Ok(())` or `Err(self)`.
    pub fn check(self) -> SdkResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Human-readable description of the status.
    pub fn description(self) -> &'static str {
        match self.0 {
            -1 => "undefined error",
            0 => "ok",
            1 => "function failed",
            2 => "function not implemented",
            3 => "could not connect to bus master",
            4 => "camera not connected",
            5 => "initialization failed",
            6 => "camera not initialized",
            7 => "invalid parameter passed to function",
            8 => "setting set to camera is invalid",
            9 => "invalid bus manager object",
            10 => "could not allocate memory",
            11 => "low level error",
            12 => "device not found",
            13 => "GUID failure",
            14 => "packet size set to camera is invalid",
            15 => "invalid mode",
            16 => "error due to not being in Format7",
            17 => "this feature is unsupported",
            18 => "timeout",
            19 => "bus master failure",
            20 => "generation count incremented",
            21 => "look up table failure",
            22 => "IIDC failure",
            23 => "strobe failure",
            24 => "trigger failure",
            25 => "property failure",
            26 => "property is not present",
            27 => "register access failed",
            28 => "register read failed",
            29 => "register write failed",
            30 => "isochronous failure",
            31 => "isochronous transfer has already been started",
            32 => "isochronous transfer has not been started",
            33 => "isochronous start failed",
            34 => "isochronous retrieve buffer failed",
            35 => "isochronous stop failed",
            36 => "isochronous image synchronization failed",
            37 => "isochronous bandwidth exceeded",
            38 => "image conversion failed",
            39 => "image library failure",
            40 => "buffer is too small",
            41 => "there is an image consistency error",
            42 => "the installed driver is not compatible with the library",
            _ => "unknown error code",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description(), self.0)
    }
}

/// SDK call that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateContext,
    DestroyContext,
    CountCameras,
    IdentifyCamera,
    Connect,
    Disconnect,
    StartCapture,
    StopCapture,
    CameraInfo,
    CreateImage,
    DestroyImage,
    RetrieveBuffer,
    ReadRegister,
    WriteRegister,
    PropertyInfo,
    GetProperty,
    SetProperty,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 17] = [
        Operation::CreateContext,
        Operation::DestroyContext,
        Operation::CountCameras,
        Operation::IdentifyCamera,
        Operation::Connect,
        Operation::Disconnect,
        Operation::StartCapture,
        Operation::StopCapture,
        Operation::CameraInfo,
        Operation::CreateImage,
        Operation::DestroyImage,
        Operation::RetrieveBuffer,
        Operation::ReadRegister,
        Operation::WriteRegister,
        Operation::PropertyInfo,
        Operation::GetProperty,
        Operation::SetProperty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateContext => "create context",
            Operation::DestroyContext => "destroy context",
            Operation::CountCameras => "count cameras",
            Operation::IdentifyCamera => "identify camera",
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::StartCapture => "start capture",
            Operation::StopCapture => "stop capture",
            Operation::CameraInfo => "get camera info",
            Operation::CreateImage => "create image",
            Operation::DestroyImage => "destroy image",
            Operation::RetrieveBuffer => "retrieve buffer",
            Operation::ReadRegister => "read register",
            Operation::WriteRegister => "write register",
            Operation::PropertyInfo => "get property info",
            Operation::GetProperty => "get property",
            Operation::SetProperty => "set property",
        }
    }

    /// Error category used when the status code itself carries no stronger hint.
    fn kind(self) -> ErrorKind {
        match self {
            Operation::CreateContext
            | Operation::DestroyContext
            | Operation::CountCameras
            | Operation::CameraInfo
            | Operation::CreateImage
            | Operation::DestroyImage => ErrorKind::Resource,
            Operation::IdentifyCamera => ErrorKind::NotFound,
            Operation::Connect
            | Operation::Disconnect
            | Operation::StartCapture
            | Operation::StopCapture => ErrorKind::Connection,
            Operation::RetrieveBuffer => ErrorKind::Capture,
            Operation::ReadRegister | Operation::WriteRegister => ErrorKind::Register,
            Operation::PropertyInfo | Operation::GetProperty | Operation::SetProperty => {
                ErrorKind::Property
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-visible failure category.
///
/// The discriminants are part of the C interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    Resource = 1,
    Connection = 2,
    InvalidArgument = 3,
    NotFound = 4,
    State = 5,
    Capture = 6,
    Property = 7,
    Register = 8,
}

/// Errors surfaced by session, image, property and register operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    /// Allocation or release of a session or image failed, or a handle is invalid
    #[error("resource error: {context}: {code}")]
    Resource { context: String, code: ErrorCode },

    /// Bind, unbind, start or stop was rejected by the device
    #[error("connection error: {context}: {code}")]
    Connection { context: String, code: ErrorCode },

    /// Host supplied a value with the wrong shape, size or tag
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Enumeration index out of range or no camera
    #[error("not found: {context}: {code}")]
    NotFound { context: String, code: ErrorCode },

    /// Operation requires a connected camera
    #[error("state error: {context}: {code}")]
    State { context: String, code: ErrorCode },

    /// Frame retrieval failed or timed out
    #[error("capture error: {context}: {code}")]
    Capture { context: String, code: ErrorCode },

    /// Device rejected a property read or write
    #[error("property error: {context}: {code}")]
    Property { context: String, code: ErrorCode },

    /// Device rejected a register read or write
    #[error("register error: {context}: {code}")]
    Register { context: String, code: ErrorCode },
}

impl CaptureError {
    /// Translate a failing SDK status for the given operation.
    pub fn from_sdk(op: Operation, code: ErrorCode) -> Self {
        let context = op.name().to_string();
        let kind = match code {
            ErrorCode::NOT_CONNECTED | ErrorCode::NOT_INITIALIZED => ErrorKind::State,
            ErrorCode::TIMEOUT if op == Operation::RetrieveBuffer => ErrorKind::Capture,
            _ => op.kind(),
        };
        Self::with_kind(kind, context, code)
    }

    /// A handle that was never issued or has already been destroyed.
    pub fn invalid_handle(what: &str, token: u64) -> Self {
        CaptureError::Resource {
            context: format!("{} handle {} is invalid or already destroyed", what, token),
            code: ErrorCode::INVALID_PARAMETER,
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CaptureError::InvalidArgument(msg.into())
    }

    fn with_kind(kind: ErrorKind, context: String, code: ErrorCode) -> Self {
        match kind {
            ErrorKind::Resource => CaptureError::Resource { context, code },
            ErrorKind::Connection => CaptureError::Connection { context, code },
            ErrorKind::InvalidArgument => CaptureError::InvalidArgument(context),
            ErrorKind::NotFound => CaptureError::NotFound { context, code },
            ErrorKind::State => CaptureError::State { context, code },
            ErrorKind::Capture => CaptureError::Capture { context, code },
            ErrorKind::Property => CaptureError::Property { context, code },
            ErrorKind::Register => CaptureError::Register { context, code },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::Resource { .. } => ErrorKind::Resource,
            CaptureError::Connection { .. } => ErrorKind::Connection,
            CaptureError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CaptureError::NotFound { .. } => ErrorKind::NotFound,
            CaptureError::State { .. } => ErrorKind::State,
            CaptureError::Capture { .. } => ErrorKind::Capture,
            CaptureError::Property { .. } => ErrorKind::Property,
            CaptureError::Register { .. } => ErrorKind::Register,
        }
    }

    /// SDK status behind this error. Argument errors report `INVALID_PARAMETER`.
    pub fn code(&self) -> ErrorCode {
        match self {
            CaptureError::InvalidArgument(_) => ErrorCode::INVALID_PARAMETER,
            CaptureError::Resource { code, .. }
            | CaptureError::Connection { code, .. }
            | CaptureError::NotFound { code, .. }
            | CaptureError::State { code, .. }
            | CaptureError::Capture { code, .. }
            | CaptureError::Property { code, .. }
            | CaptureError::Register { code, .. } => *code,
        }
    }
}

/// Result type for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Result type for raw SDK calls
pub type SdkResult<T> = std::result::Result<T, ErrorCode>;

/// Attach an operation to a raw SDK result.
pub(crate) trait SdkResultExt<T> {
    fn during(self, op: Operation) -> Result<T>;
}

impl<T> SdkResultExt<T> for SdkResult<T> {
    fn during(self, op: Operation) -> Result<T> {
        self.map_err(|code| CaptureError::from_sdk(op, code))
    }
}
