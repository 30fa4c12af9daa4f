//! Client-side HTTP request execution and validation pipeline.
//!
//! # Overview
//! Describe an API call as an [`Endpoint`], hand it to a [`NetworkService`],
//! and get back either a decoded payload or a classified [`NetworkError`].
//! The service dispatches the call over one of four transfer modes (plain,
//! upload, download to disk, fetch into memory), validates the status code,
//! and decodes the body with a pluggable [`Codec`].
//!
//! # Design
//! - Each call is either awaited (`request`, `download`, ...) or handed to a
//!   callback (`request_with`, `download_with`, ...). Both run the same
//!   pipeline; the callback form adds a [`CancelHandle`].
//! - The network sits behind the [`Transport`] trait. [`ReqwestTransport`]
//!   is the production implementation; tests drive the pipeline with a
//!   scripted one.
//! - Validation rejects statuses in [`VALIDATION_BAND`] unless disabled per
//!   call or service-wide. A per-call opt-out always wins.
//! - One attempt per call. Nothing is retried, cached or queued.

pub mod cancel;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod http;
pub mod outcome;
pub mod persist;
pub mod progress;
pub mod reqwest_transport;
pub mod service;
pub mod transport;
pub mod validate;

#[cfg(test)]
mod testing;

pub use cancel::CancelHandle;
pub use codec::{Codec, JsonCodec};
pub use config::{ConfigError, ServiceConfig, TransferConfig, TransferDefaults};
pub use endpoint::{Endpoint, Header, Parameters};
pub use error::{ErrorKind, NetworkError};
pub use http::{CachePolicy, HttpMethod, HttpRequest, ResponseMeta};
pub use outcome::{Outcome, Response};
pub use persist::{LocalFs, Persist};
pub use progress::ProgressObserver;
pub use reqwest_transport::ReqwestTransport;
pub use service::{NetworkService, ServiceBuilder};
pub use transport::{Transport, TransportError};
pub use validate::{validate, VALIDATION_BAND};
