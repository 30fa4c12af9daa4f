//! Byte transport capability consumed by the pipeline.
//!
//! # Design
//! The pipeline only needs four primitives: send a request, upload a body
//! alongside a bodyless request, download to a temporary file, and fetch a
//! URL into memory. Anything that can do those (a real HTTP client, a test
//! double) can drive the whole pipeline.
//!
//! Cancellation is expressed the Rust way: dropping the returned future
//! aborts the operation. Implementations must release their network resources
//! on drop.

use std::future::Future;
use std::path::Path;

use bytes::Bytes;
use tempfile::TempPath;
use url::Url;

use crate::http::{HttpRequest, ResponseMeta};
use crate::progress::ProgressObserver;

/// Failure reported by a transport.
///
/// `status` is set when an HTTP response had already been received when the
/// failure occurred (for example a body read that broke off midway).
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct TransportError {
    pub status: Option<u16>,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl TransportError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self {
            status: None,
            source: source.into(),
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            source: Box::new(e),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e)
    }
}

/// Body and metadata of a completed in-memory transfer.
#[derive(Debug, Clone)]
pub struct Transferred {
    pub body: Bytes,
    pub meta: ResponseMeta,
}

/// Temporary file produced by a download. The file is removed when this
/// value is dropped unless it has been moved away first.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
}

impl TempArtifact {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of a completed download.
#[derive(Debug)]
pub struct Downloaded {
    pub artifact: TempArtifact,
    pub meta: ResponseMeta,
}

/// Asynchronous byte transport.
///
/// Progress observers, when given, are invoked from whatever task drives the
/// returned future.
pub trait Transport: Send + Sync + 'static {
    /// Send `request` as-is and collect the response body.
    fn send(
        &self,
        request: HttpRequest,
        progress: Option<ProgressObserver>,
    ) -> impl Future<Output = Result<Transferred, TransportError>> + Send;

    /// Send `request` (which carries no body) with `body` as its upload
    /// payload.
    fn upload(
        &self,
        request: HttpRequest,
        body: Bytes,
        progress: Option<ProgressObserver>,
    ) -> impl Future<Output = Result<Transferred, TransportError>> + Send;

    /// GET `url` into a temporary file.
    fn download(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> impl Future<Output = Result<Downloaded, TransportError>> + Send;

    /// GET `url` into memory.
    fn fetch(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> impl Future<Output = Result<Transferred, TransportError>> + Send;
}
