//! Transfer execution for each transfer mode.
//!
//! # Design
//! `prepare` runs synchronously and decides everything that can fail before
//! the transport is touched (currently the upload precondition), so callback
//! callers learn whether a call started before anything is spawned. The
//! async functions then map transport results into `NetworkError`s with the
//! status already observed.

use std::path::Path;

use bytes::Bytes;
use url::Url;

use crate::error::NetworkError;
use crate::http::{HttpRequest, ResponseMeta};
use crate::persist::Persist;
use crate::progress::ProgressObserver;
use crate::transport::{Downloaded, Transferred, Transport};

/// How a prepared request is handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Send the request as-is.
    Plain(HttpRequest),
    /// Send the bodyless request with its former body as upload payload.
    Upload { request: HttpRequest, body: Bytes },
}

impl Dispatch {
    pub fn request(&self) -> &HttpRequest {
        match self {
            Dispatch::Plain(request) | Dispatch::Upload { request, .. } => request,
        }
    }
}

/// Select the transfer mode for `request`.
///
/// Upload mode requires POST or PUT and a body; otherwise the call fails
/// with an empty `Precondition` error.
pub fn prepare(mut request: HttpRequest, use_upload_mode: bool) -> Result<Dispatch, NetworkError> {
    if !use_upload_mode {
        return Ok(Dispatch::Plain(request));
    }
    if !request.method.allows_upload() {
        tracing::debug!(method = %request.method, "upload mode needs POST or PUT");
        return Err(NetworkError::precondition());
    }
    match request.body.take() {
        Some(body) => Ok(Dispatch::Upload { request, body }),
        None => {
            tracing::debug!(url = %request.url, "upload mode without a body");
            Err(NetworkError::precondition())
        }
    }
}

pub async fn perform<T: Transport>(
    transport: &T,
    dispatch: Dispatch,
    progress: Option<ProgressObserver>,
) -> Result<Transferred, NetworkError> {
    let result = match dispatch {
        Dispatch::Plain(request) => transport.send(request, progress).await,
        Dispatch::Upload { request, body } => transport.upload(request, body, progress).await,
    };
    result.map_err(NetworkError::transport)
}

pub async fn download<T: Transport>(
    transport: &T,
    url: Url,
    progress: Option<ProgressObserver>,
) -> Result<Downloaded, NetworkError> {
    transport
        .download(url, progress)
        .await
        .map_err(NetworkError::transport)
}

/// Place a downloaded artifact at `dest`.
///
/// An existing file at `dest` counts as already satisfied and the artifact
/// is discarded. Filesystem failures carry the status observed on the
/// download response.
pub async fn persist<P: Persist>(
    persist: &P,
    downloaded: Downloaded,
    dest: &Path,
) -> Result<bool, NetworkError> {
    let Downloaded { artifact, meta } = downloaded;
    if persist.exists(dest).await {
        tracing::debug!(dest = %dest.display(), "destination exists, keeping it");
        return Ok(true);
    }
    persist
        .move_or_copy(artifact.path(), dest)
        .await
        .map_err(|e| NetworkError::persistence(meta.status, e))?;
    Ok(true)
}

/// GET `url` into memory. A zero-length body is reported as `None`.
pub async fn fetch<T: Transport>(
    transport: &T,
    url: Url,
    progress: Option<ProgressObserver>,
) -> Result<(Option<Bytes>, ResponseMeta), NetworkError> {
    let Transferred { body, meta } = transport
        .fetch(url, progress)
        .await
        .map_err(NetworkError::transport)?;
    let body = if body.is_empty() { None } else { Some(body) };
    Ok((body, meta))
}
