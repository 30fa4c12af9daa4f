//! [`Transport`] implementation over `reqwest`.
//!
//! Bodies are streamed chunk by chunk so progress observers see every chunk
//! as it moves. Downloads are written to a temporary file that is removed
//! again if the transfer fails or the artifact is never persisted.

use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::ServiceConfig;
use crate::http::{CachePolicy, HttpRequest, ResponseMeta};
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::transport::{Downloaded, TempArtifact, Transferred, Transport, TransportError};

const UPLOAD_CHUNK: usize = 64 * 1024;

/// HTTP transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap a client the caller configured. `ServiceConfig` settings are not
    /// applied to it.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn prepare(&self, request: HttpRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(TransportError::new)?;
        let mut builder = self.client.request(method, request.url);
        for (field, value) in request.headers {
            builder = builder.header(field, value);
        }
        if let Some(directive) = request.cache_policy.and_then(cache_directive) {
            builder = builder.header(CACHE_CONTROL, directive);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        Ok(builder)
    }

    /// Builder for a streamed upload of `total` bytes. A `Content-Length`
    /// the caller already set is sent alone instead of alongside ours.
    fn prepare_upload(
        &self,
        request: HttpRequest,
        total: u64,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let has_length = request
            .headers
            .iter()
            .any(|(field, _)| field.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()));
        let builder = self.prepare(request)?;
        Ok(if has_length {
            builder
        } else {
            builder.header(CONTENT_LENGTH, total)
        })
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        tracing::trace!(method = %request.method, url = %request.url, "sending");
        let response = self.prepare(request)?.send().await?;
        read_body(response, progress).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        body: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        let total = body.len() as u64;
        tracing::trace!(method = %request.method, url = %request.url, total, "uploading");
        let mut tracker = ProgressTracker::new(progress, Some(total));
        let chunks = stream::iter(split(body)).map(move |chunk| {
            tracker.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        });
        let response = self
            .prepare_upload(request, total)?
            .body(reqwest::Body::wrap_stream(chunks))
            .send()
            .await?;
        read_body(response, None).await
    }

    async fn download(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> Result<Downloaded, TransportError> {
        tracing::trace!(%url, "downloading");
        let response = self.client.get(url).send().await?;
        let meta = meta_of(&response);
        let status = meta.status;
        let mut tracker = ProgressTracker::new(progress, response.content_length());

        let (file, path) = tempfile::NamedTempFile::new()?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| TransportError::from(e).with_status(status))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| TransportError::from(e).with_status(status))?;
            tracker.advance(chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|e| TransportError::from(e).with_status(status))?;
        drop(file);
        tracker.finish();

        Ok(Downloaded {
            artifact: TempArtifact::new(path),
            meta,
        })
    }

    async fn fetch(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        tracing::trace!(%url, "fetching");
        let response = self.client.get(url).send().await?;
        read_body(response, progress).await
    }
}

async fn read_body(
    response: reqwest::Response,
    progress: Option<ProgressObserver>,
) -> Result<Transferred, TransportError> {
    let meta = meta_of(&response);
    let mut tracker = ProgressTracker::new(progress, response.content_length());
    let mut body = BytesMut::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| TransportError::from(e).with_status(meta.status))?;
        tracker.advance(chunk.len() as u64);
        body.extend_from_slice(&chunk);
    }
    tracker.finish();
    Ok(Transferred {
        body: body.freeze(),
        meta,
    })
}

fn meta_of(response: &reqwest::Response) -> ResponseMeta {
    ResponseMeta {
        status: Some(response.status().as_u16()),
        url: Some(response.url().clone()),
        headers: response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
    }
}

// reqwest keeps no local cache, so only the directives that change what an
// upstream cache may do are forwarded.
fn cache_directive(policy: CachePolicy) -> Option<&'static str> {
    match policy {
        CachePolicy::UseProtocol | CachePolicy::ReturnCacheElseLoad => None,
        CachePolicy::ReloadIgnoringLocalCache => Some("no-cache"),
        CachePolicy::ReturnCacheDontLoad => Some("only-if-cached"),
    }
}

fn split(body: Bytes) -> Vec<Bytes> {
    (0..body.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| body.slice(start..(start + UPLOAD_CHUNK).min(body.len())))
        .collect()
}
