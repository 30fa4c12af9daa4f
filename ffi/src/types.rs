//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Handles (`FfiService`, `FfiEndpoint`, `FfiCancelHandle`) are opaque boxes
//! around core types. Everything a callback receives is packed into one
//! `FfiOutcome` envelope that the caller frees with `courier_free_outcome`.
//! Conversion functions live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::ptr;

use bytes::Bytes;
use courier_core::{
    CancelHandle, Endpoint, ErrorKind, HttpMethod, NetworkError, NetworkService, Outcome,
    ReqwestTransport,
};
use tokio::runtime::Runtime;

/// Opaque handle to a `NetworkService` and the runtime its calls run on.
///
/// Field order matters: the service drops before the runtime.
pub struct FfiService {
    pub(crate) inner: NetworkService<ReqwestTransport>,
    pub(crate) runtime: Runtime,
}

/// Opaque handle to an `Endpoint`.
pub struct FfiEndpoint {
    pub(crate) inner: Endpoint,
}

/// Opaque handle used to cancel one in-flight call.
pub struct FfiCancelHandle {
    pub(crate) inner: CancelHandle,
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Completion callback. Receives ownership of `outcome`.
pub type FfiCompletion = extern "C" fn(outcome: *mut FfiOutcome, user_data: *mut c_void);

/// Progress callback. `fraction` is in `0.0..=1.0`.
pub type FfiProgress = extern "C" fn(fraction: f64, user_data: *mut c_void);

/// Caller context passed back verbatim to callbacks.
///
/// Callbacks fire on runtime worker threads, so callers must hand in a
/// pointer that is valid to use from any thread.
#[derive(Clone, Copy)]
pub(crate) struct UserData(*mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    // Closures must capture the wrapper, not the raw field.
    pub(crate) fn get(self) -> *mut c_void {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
    Connect = 7,
    Trace = 8,
    Query = 9,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Patch => HttpMethod::Patch,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Options => HttpMethod::Options,
            FfiHttpMethod::Connect => HttpMethod::Connect,
            FfiHttpMethod::Trace => HttpMethod::Trace,
            FfiHttpMethod::Query => HttpMethod::Query,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiOutcome`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    MalformedTarget = 1,
    Precondition = 2,
    Transport = 3,
    Validation = 4,
    Decode = 5,
    Persistence = 6,
    Cancelled = 7,
    Panic = 8,
    NullArg = 9,
    InvalidUtf8 = 10,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::MalformedTarget => FfiErrorCode::MalformedTarget,
            ErrorKind::Precondition => FfiErrorCode::Precondition,
            ErrorKind::Transport => FfiErrorCode::Transport,
            ErrorKind::Validation => FfiErrorCode::Validation,
            ErrorKind::Decode => FfiErrorCode::Decode,
            ErrorKind::Persistence => FfiErrorCode::Persistence,
            ErrorKind::Cancelled => FfiErrorCode::Cancelled,
            ErrorKind::Panicked => FfiErrorCode::Panic,
        }
    }
}

/// Terminal result of one call.
///
/// On success `error_code` is `Ok` and `message` is null. `body` holds the
/// response body (raw calls and fetches) or is null (downloads, empty
/// fetches). On failure `message` describes the error and `body` holds the
/// server's body when one was received. `status` is `-1` when no response
/// arrived.
#[repr(C)]
pub struct FfiOutcome {
    pub error_code: FfiErrorCode,
    pub status: i32,
    pub body: *mut u8,
    pub body_len: usize,
    pub message: *mut c_char,
}

impl FfiOutcome {
    fn boxed(
        error_code: FfiErrorCode,
        status: Option<u16>,
        body: Option<Bytes>,
        message: Option<String>,
    ) -> *mut Self {
        let (body, body_len) = match body {
            Some(b) if !b.is_empty() => {
                let len = b.len();
                let raw = Box::into_raw(b.to_vec().into_boxed_slice());
                (raw as *mut u8, len)
            }
            _ => (ptr::null_mut(), 0),
        };
        let message = match message {
            Some(m) => CString::new(m).unwrap_or_default().into_raw(),
            None => ptr::null_mut(),
        };
        Box::into_raw(Box::new(FfiOutcome {
            error_code,
            status: status.map_or(-1, i32::from),
            body,
            body_len,
            message,
        }))
    }

    /// Build an outcome from a call that produced a body.
    pub(crate) fn from_body(outcome: Outcome<Bytes>) -> *mut Self {
        match outcome {
            Outcome::Success { payload, meta } => {
                Self::boxed(FfiErrorCode::Ok, meta.status, Some(payload), None)
            }
            Outcome::Failure(err) => Self::from_error(err),
        }
    }

    /// Build an outcome from a fetch, where an empty body is `None`.
    pub(crate) fn from_fetch(outcome: Outcome<Option<Bytes>>) -> *mut Self {
        match outcome {
            Outcome::Success { payload, meta } => {
                Self::boxed(FfiErrorCode::Ok, meta.status, payload, None)
            }
            Outcome::Failure(err) => Self::from_error(err),
        }
    }

    /// Build an outcome from a download. The body is always null.
    pub(crate) fn from_download(outcome: Outcome<bool>) -> *mut Self {
        match outcome {
            Outcome::Success { meta, .. } => Self::boxed(FfiErrorCode::Ok, meta.status, None, None),
            Outcome::Failure(err) => Self::from_error(err),
        }
    }

    pub(crate) fn from_error(err: NetworkError) -> *mut Self {
        let message = match &err.underlying {
            Some(cause) if err.kind != ErrorKind::Cancelled => format!("{err}: {cause}"),
            _ => err.to_string(),
        };
        Self::boxed(
            err.kind.into(),
            err.status_code,
            err.body.clone(),
            Some(message),
        )
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::NullArg,
            None,
            None,
            Some(format!("null argument: {name}")),
        )
    }

    pub(crate) fn invalid_utf8(name: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::InvalidUtf8,
            None,
            None,
            Some(format!("argument is not UTF-8: {name}")),
        )
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, None, None, Some(msg.to_string()))
    }
}
