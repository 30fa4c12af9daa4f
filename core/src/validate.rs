//! Status-code validation policy.
//!
//! Precedence: a per-call opt-out always wins, then the service-wide flag,
//! then the status check against [`VALIDATION_BAND`].

use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::error::NetworkError;

/// Status codes rejected while validation is enabled. 3xx responses are
/// accepted.
pub const VALIDATION_BAND: RangeInclusive<u16> = 400..=599;

/// Check one completed transfer.
///
/// A missing status code fails when both levels are enabled.
pub fn validate(
    status: Option<u16>,
    body: Option<&Bytes>,
    request_level: bool,
    global: bool,
) -> Result<(), NetworkError> {
    if !request_level || !global {
        return Ok(());
    }
    match status {
        Some(code) if !VALIDATION_BAND.contains(&code) => Ok(()),
        _ => Err(NetworkError::validation(status, body.cloned())),
    }
}
