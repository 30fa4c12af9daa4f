//! Request execution pipeline with async and callback surfaces.
//!
//! # Design
//! The pipeline (build request, transfer, validate, decode) is written once
//! as async code on `Inner`. The async methods await it directly in the
//! caller's task. The `*_with` methods spawn the same future on the
//! service's runtime, race it against a `CancelHandle`, and hand the terminal
//! `Outcome` to the callback exactly once. A panic inside the call (from a
//! progress observer or codec) is caught and delivered as a `Panicked`
//! failure. A panic inside the callback itself is not caught.
//!
//! Everything that can fail before the transport is touched (malformed
//! target, upload precondition) is checked synchronously, so callback
//! methods can return `None` for calls that never started. The callback
//! still fires for those, with the failure.
//!
//! Callbacks run on a runtime worker thread and must be `Send + 'static`.
//! Dropping the future returned by an async method aborts that call.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use url::Url;

use crate::cancel::CancelHandle;
use crate::codec::{Codec, JsonCodec};
use crate::config::{ServiceConfig, TransferConfig, TransferDefaults};
use crate::endpoint::Endpoint;
use crate::error::NetworkError;
use crate::executor::{self, Dispatch};
use crate::outcome::{Outcome, Response};
use crate::persist::{LocalFs, Persist};
use crate::progress::ProgressObserver;
use crate::transport::{Transferred, Transport};
use crate::validate::validate;

/// Entry point for all calls against one transport.
///
/// Cloning is cheap; clones share the transport and the service-wide
/// validation flag.
pub struct NetworkService<T, C = JsonCodec, P = LocalFs> {
    inner: Arc<Inner<T, C, P>>,
}

impl<T, C, P> Clone for NetworkService<T, C, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, C, P> {
    transport: T,
    codec: C,
    persist: P,
    defaults: TransferDefaults,
    auto_validation: AtomicBool,
    runtime: Handle,
}

/// A call that passed every pre-transport check.
struct Started {
    dispatch: Dispatch,
    auto_validate: bool,
    progress: Option<ProgressObserver>,
}

/// Builder for services with a non-default codec, filesystem or defaults.
pub struct ServiceBuilder<T, C = JsonCodec, P = LocalFs> {
    transport: T,
    codec: C,
    persist: P,
    defaults: TransferDefaults,
    auto_validation: bool,
}

impl<T: Transport> ServiceBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            codec: JsonCodec,
            persist: LocalFs,
            defaults: TransferDefaults::default(),
            auto_validation: true,
        }
    }
}

impl<T: Transport, C: Codec, P: Persist> ServiceBuilder<T, C, P> {
    pub fn codec<C2: Codec>(self, codec: C2) -> ServiceBuilder<T, C2, P> {
        ServiceBuilder {
            transport: self.transport,
            codec,
            persist: self.persist,
            defaults: self.defaults,
            auto_validation: self.auto_validation,
        }
    }

    pub fn persist<P2: Persist>(self, persist: P2) -> ServiceBuilder<T, C, P2> {
        ServiceBuilder {
            transport: self.transport,
            codec: self.codec,
            persist,
            defaults: self.defaults,
            auto_validation: self.auto_validation,
        }
    }

    /// Fallbacks for `TransferConfig` fields a call leaves unset.
    pub fn defaults(mut self, defaults: TransferDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn config(mut self, config: &ServiceConfig) -> Self {
        self.auto_validation = config.auto_validate;
        self
    }

    /// Finish the service. Callback-style calls are spawned on `runtime`.
    pub fn build(self, runtime: Handle) -> NetworkService<T, C, P> {
        NetworkService {
            inner: Arc::new(Inner {
                transport: self.transport,
                codec: self.codec,
                persist: self.persist,
                defaults: self.defaults,
                auto_validation: AtomicBool::new(self.auto_validation),
                runtime,
            }),
        }
    }
}

impl<T: Transport> NetworkService<T> {
    pub fn new(transport: T, runtime: Handle) -> Self {
        ServiceBuilder::new(transport).build(runtime)
    }

    pub fn builder(transport: T) -> ServiceBuilder<T> {
        ServiceBuilder::new(transport)
    }
}

impl<T: Transport, C: Codec, P: Persist> NetworkService<T, C, P> {
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    pub fn persist(&self) -> &P {
        &self.inner.persist
    }

    /// Service-wide validation flag.
    pub fn auto_validation(&self) -> bool {
        self.inner.global_validation()
    }

    pub fn set_auto_validation(&self, enabled: bool) {
        self.inner.auto_validation.store(enabled, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Async API
    // -----------------------------------------------------------------------

    /// Run `endpoint` and decode the body into `R`.
    pub async fn request<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        config: TransferConfig,
    ) -> Result<Response<R>, NetworkError> {
        let started = self.inner.start(endpoint, &config).inspect_err(log_failure)?;
        finish(self.inner.decoded(started).await)
    }

    /// Run `endpoint` and return the raw body.
    pub async fn request_data(
        &self,
        endpoint: &Endpoint,
        config: TransferConfig,
    ) -> Result<Response<Bytes>, NetworkError> {
        let started = self.inner.start(endpoint, &config).inspect_err(log_failure)?;
        finish(self.inner.raw(started).await)
    }

    /// Download `url` to `dest`. Resolves to `true` once the file is in
    /// place, including when `dest` already existed.
    pub async fn download(
        &self,
        url: &str,
        dest: impl AsRef<Path>,
        config: TransferConfig,
    ) -> Result<Response<bool>, NetworkError> {
        let url = parse_url(url).inspect_err(log_failure)?;
        let resolved = config.resolve(&self.inner.defaults);
        finish(
            self.inner
                .download(url, dest.as_ref(), resolved.auto_validate, config.progress)
                .await,
        )
    }

    /// GET `url` into memory. An empty body resolves to `None`.
    pub async fn fetch(
        &self,
        url: &str,
        config: TransferConfig,
    ) -> Result<Response<Option<Bytes>>, NetworkError> {
        let url = parse_url(url).inspect_err(log_failure)?;
        let resolved = config.resolve(&self.inner.defaults);
        finish(
            self.inner
                .fetch(url, resolved.auto_validate, config.progress)
                .await,
        )
    }

    // -----------------------------------------------------------------------
    // Callback API
    // -----------------------------------------------------------------------

    /// Callback form of [`request`](Self::request).
    pub fn request_with<R, F>(
        &self,
        endpoint: &Endpoint,
        config: TransferConfig,
        on_complete: F,
    ) -> Option<CancelHandle>
    where
        R: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<R>) + Send + 'static,
    {
        let started = match self.inner.start(endpoint, &config) {
            Ok(started) => started,
            Err(e) => return self.reject(e, on_complete),
        };
        let inner = Arc::clone(&self.inner);
        Some(self.spawn(async move { inner.decoded::<R>(started).await }, on_complete))
    }

    /// Callback form of [`request_data`](Self::request_data).
    pub fn request_data_with<F>(
        &self,
        endpoint: &Endpoint,
        config: TransferConfig,
        on_complete: F,
    ) -> Option<CancelHandle>
    where
        F: FnOnce(Outcome<Bytes>) + Send + 'static,
    {
        let started = match self.inner.start(endpoint, &config) {
            Ok(started) => started,
            Err(e) => return self.reject(e, on_complete),
        };
        let inner = Arc::clone(&self.inner);
        Some(self.spawn(async move { inner.raw(started).await }, on_complete))
    }

    /// Callback form of [`download`](Self::download).
    pub fn download_with<F>(
        &self,
        url: &str,
        dest: impl Into<PathBuf>,
        config: TransferConfig,
        on_complete: F,
    ) -> Option<CancelHandle>
    where
        F: FnOnce(Outcome<bool>) + Send + 'static,
    {
        let url = match parse_url(url) {
            Ok(url) => url,
            Err(e) => return self.reject(e, on_complete),
        };
        let dest = dest.into();
        let auto_validate = config.resolve(&self.inner.defaults).auto_validate;
        let inner = Arc::clone(&self.inner);
        Some(self.spawn(
            async move {
                inner
                    .download(url, &dest, auto_validate, config.progress)
                    .await
            },
            on_complete,
        ))
    }

    /// Callback form of [`fetch`](Self::fetch).
    pub fn fetch_with<F>(
        &self,
        url: &str,
        config: TransferConfig,
        on_complete: F,
    ) -> Option<CancelHandle>
    where
        F: FnOnce(Outcome<Option<Bytes>>) + Send + 'static,
    {
        let url = match parse_url(url) {
            Ok(url) => url,
            Err(e) => return self.reject(e, on_complete),
        };
        let auto_validate = config.resolve(&self.inner.defaults).auto_validate;
        let inner = Arc::clone(&self.inner);
        Some(self.spawn(
            async move { inner.fetch(url, auto_validate, config.progress).await },
            on_complete,
        ))
    }

    fn spawn<O, Fut, F>(&self, call: Fut, on_complete: F) -> CancelHandle
    where
        O: Send + 'static,
        Fut: Future<Output = Result<Response<O>, NetworkError>> + Send + 'static,
        F: FnOnce(Outcome<O>) + Send + 'static,
    {
        let handle = CancelHandle::new();
        let signal = handle.clone();
        self.inner.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = signal.cancelled() => Err(NetworkError::cancelled()),
                result = AssertUnwindSafe(call).catch_unwind() => {
                    result.unwrap_or_else(|panic| Err(NetworkError::panicked(&*panic)))
                }
            };
            on_complete(Outcome::from(finish(result)));
        });
        handle
    }

    fn reject<O, F>(&self, err: NetworkError, on_complete: F) -> Option<CancelHandle>
    where
        O: Send + 'static,
        F: FnOnce(Outcome<O>) + Send + 'static,
    {
        log_failure(&err);
        self.inner
            .runtime
            .spawn(async move { on_complete(Outcome::Failure(err)) });
        None
    }
}

impl<T: Transport, C: Codec, P: Persist> Inner<T, C, P> {
    fn global_validation(&self) -> bool {
        self.auto_validation.load(Ordering::Acquire)
    }

    fn start(&self, endpoint: &Endpoint, config: &TransferConfig) -> Result<Started, NetworkError> {
        let resolved = config.resolve(&self.defaults);
        let request = endpoint.to_request()?;
        let dispatch = executor::prepare(request, resolved.use_upload_mode)?;
        Ok(Started {
            dispatch,
            auto_validate: resolved.auto_validate,
            progress: config.progress.clone(),
        })
    }

    async fn transfer(&self, started: Started) -> Result<Transferred, NetworkError> {
        let Started {
            dispatch,
            auto_validate,
            progress,
        } = started;
        {
            let request = dispatch.request();
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                upload = matches!(dispatch, Dispatch::Upload { .. }),
                "dispatched"
            );
        }
        let transferred = executor::perform(&self.transport, dispatch, progress).await?;
        tracing::trace!(status = ?transferred.meta.status, "validating");
        validate(
            transferred.meta.status,
            Some(&transferred.body),
            auto_validate,
            self.global_validation(),
        )?;
        Ok(transferred)
    }

    async fn raw(&self, started: Started) -> Result<Response<Bytes>, NetworkError> {
        let Transferred { body, meta } = self.transfer(started).await?;
        Ok(Response {
            payload: body,
            meta,
        })
    }

    async fn decoded<R: DeserializeOwned>(&self, started: Started) -> Result<Response<R>, NetworkError> {
        let Transferred { body, meta } = self.transfer(started).await?;
        tracing::trace!(len = body.len(), "decoding");
        match self.codec.decode::<R>(&body) {
            Some(payload) => Ok(Response { payload, meta }),
            None => Err(NetworkError::decode(meta.status, body)),
        }
    }

    async fn download(
        &self,
        url: Url,
        dest: &Path,
        auto_validate: bool,
        progress: Option<ProgressObserver>,
    ) -> Result<Response<bool>, NetworkError> {
        tracing::debug!(%url, dest = %dest.display(), "dispatched download");
        let downloaded = executor::download(&self.transport, url, progress).await?;
        validate(
            downloaded.meta.status,
            None,
            auto_validate,
            self.global_validation(),
        )?;
        let meta = downloaded.meta.clone();
        let saved = executor::persist(&self.persist, downloaded, dest).await?;
        Ok(Response {
            payload: saved,
            meta,
        })
    }

    async fn fetch(
        &self,
        url: Url,
        auto_validate: bool,
        progress: Option<ProgressObserver>,
    ) -> Result<Response<Option<Bytes>>, NetworkError> {
        tracing::debug!(%url, "dispatched fetch");
        let (body, meta) = executor::fetch(&self.transport, url, progress).await?;
        validate(meta.status, body.as_ref(), auto_validate, self.global_validation())?;
        Ok(Response {
            payload: body,
            meta,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, NetworkError> {
    Url::parse(raw).map_err(|_| NetworkError::malformed_target())
}

fn finish<O>(result: Result<Response<O>, NetworkError>) -> Result<Response<O>, NetworkError> {
    match &result {
        Ok(response) => tracing::debug!(status = ?response.meta.status, "completed"),
        Err(e) => log_failure(e),
    }
    result
}

fn log_failure(err: &NetworkError) {
    tracing::debug!(kind = ?err.kind, status = ?err.status_code, "failed: {err}");
}
