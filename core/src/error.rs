//! Error type surfaced by every pipeline call.
//!
//! # Design
//! A single `NetworkError` struct carries whatever the pipeline observed at
//! the point of failure: the underlying cause, the HTTP status and the raw
//! body. `kind` classifies where in the pipeline the call stopped so callers
//! can branch without inspecting the cause.
//!
//! A failure that never reached the transport (malformed target, upload
//! precondition) carries neither a cause nor a status; `is_empty` checks
//! for that shape.

use std::any::Any;
use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::transport::TransportError;

/// Shared, cloneable error cause.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Where in the pipeline a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `base_url + path` did not parse as an absolute URL.
    MalformedTarget,
    /// Upload mode requested without a POST/PUT method or without a body.
    Precondition,
    /// The transport reported a failure.
    Transport,
    /// The status code fell inside the validation band.
    Validation,
    /// The body could not be decoded into the requested type.
    Decode,
    /// A downloaded artifact could not be moved to its destination.
    Persistence,
    /// The call was cancelled through its handle.
    Cancelled,
    /// Caller-supplied code (a progress observer or codec) panicked while a
    /// callback-style call was running.
    Panicked,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MalformedTarget => "malformed endpoint URL",
            ErrorKind::Precondition => "upload precondition not met",
            ErrorKind::Transport => "transport failure",
            ErrorKind::Validation => "status code failed validation",
            ErrorKind::Decode => "response body could not be decoded",
            ErrorKind::Persistence => "downloaded file could not be persisted",
            ErrorKind::Cancelled => "operation cancelled",
            ErrorKind::Panicked => "call panicked",
        };
        f.write_str(s)
    }
}

/// Cause attached to cancelled calls.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cause attached to calls that panicked, carrying the panic message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct Panicked(pub String);

/// Terminal failure of one pipeline call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}{}", .status_code.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct NetworkError {
    pub kind: ErrorKind,
    #[source]
    pub underlying: Option<Cause>,
    pub status_code: Option<u16>,
    /// Raw body captured when the failure happened.
    pub body: Option<Bytes>,
}

impl NetworkError {
    fn bare(kind: ErrorKind) -> Self {
        Self {
            kind,
            underlying: None,
            status_code: None,
            body: None,
        }
    }

    pub fn malformed_target() -> Self {
        Self::bare(ErrorKind::MalformedTarget)
    }

    pub fn precondition() -> Self {
        Self::bare(ErrorKind::Precondition)
    }

    pub fn transport(err: TransportError) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status_code: err.status,
            underlying: Some(Arc::new(err)),
            body: None,
        }
    }

    pub fn validation(status_code: Option<u16>, body: Option<Bytes>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            underlying: None,
            status_code,
            body,
        }
    }

    pub fn decode(status_code: Option<u16>, body: Bytes) -> Self {
        Self {
            kind: ErrorKind::Decode,
            underlying: None,
            status_code,
            body: Some(body),
        }
    }

    pub fn persistence(status_code: Option<u16>, err: io::Error) -> Self {
        Self {
            kind: ErrorKind::Persistence,
            underlying: Some(Arc::new(err)),
            status_code,
            body: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            underlying: Some(Arc::new(Cancelled)),
            status_code: None,
            body: None,
        }
    }

    /// Failure for a call whose future panicked. `payload` is what
    /// `catch_unwind` returned.
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            kind: ErrorKind::Panicked,
            underlying: Some(Arc::new(Panicked(message))),
            status_code: None,
            body: None,
        }
    }

    /// True when the error carries neither a cause nor a status. Every
    /// failure raised before the transport runs is empty, as is a
    /// validation failure for a response that reported no status.
    pub fn is_empty(&self) -> bool {
        self.underlying.is_none() && self.status_code.is_none()
    }
}
