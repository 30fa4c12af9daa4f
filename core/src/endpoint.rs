//! Endpoint descriptions and their conversion into concrete requests.
//!
//! # Design
//! `method` and `base_url` are fixed when an `Endpoint` is built. `path` and
//! `params` may be rewritten between calls, including from other threads, so
//! they live behind a mutex and every accessor takes the lock for the
//! duration of one read or write. `to_request` reads both under a single
//! acquisition, which is the snapshot an in-flight call works from.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::codec::{Codec, JsonCodec};
use crate::error::NetworkError;
use crate::http::{CachePolicy, HttpMethod, HttpRequest};

/// One request header as a `(value, field)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub value: String,
    pub field: String,
}

impl Header {
    pub fn new(value: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            field: field.into(),
        }
    }
}

/// Optional request parameters attached to an endpoint.
///
/// Headers are applied in list order; repeated field names are all sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub body: Option<Bytes>,
    pub cache_policy: Option<CachePolicy>,
    pub timeout: Option<Duration>,
    pub headers: Vec<Header>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters carrying `value` as a JSON body with a matching
    /// `Content-Type`. Returns `None` if the value cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Option<Self> {
        let body = JsonCodec.encode(value)?;
        Some(
            Self::new()
                .with_body(body)
                .with_header("application/json", "Content-Type"),
        )
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, value: impl Into<String>, field: impl Into<String>) -> Self {
        self.headers.push(Header::new(value, field));
        self
    }
}

#[derive(Debug)]
struct Target {
    path: String,
    params: Option<Parameters>,
}

/// Abstract description of an API endpoint.
#[derive(Debug)]
pub struct Endpoint {
    method: HttpMethod,
    base_url: String,
    target: Mutex<Target>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            target: Mutex::new(Target {
                path: path.into(),
                params: None,
            }),
        }
    }

    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, base_url, path)
    }

    pub fn with_params(self, params: Parameters) -> Self {
        self.set_params(Some(params));
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn path(&self) -> String {
        self.lock().path.clone()
    }

    pub fn set_path(&self, path: impl Into<String>) {
        self.lock().path = path.into();
    }

    pub fn params(&self) -> Option<Parameters> {
        self.lock().params.clone()
    }

    pub fn set_params(&self, params: Option<Parameters>) {
        self.lock().params = params;
    }

    /// Edit the parameters in place under one lock acquisition, so
    /// concurrent edits from several threads all land.
    pub fn update_params<R>(&self, edit: impl FnOnce(&mut Option<Parameters>) -> R) -> R {
        edit(&mut self.lock().params)
    }

    /// Absolute URL of `base_url + path`.
    pub fn url(&self) -> Result<Url, NetworkError> {
        let path = self.path();
        join(&self.base_url, &path)
    }

    /// Snapshot the endpoint into a concrete request.
    ///
    /// Fails with an empty `MalformedTarget` error when `base_url + path`
    /// is not an absolute URL.
    pub fn to_request(&self) -> Result<HttpRequest, NetworkError> {
        let (path, params) = {
            let target = self.lock();
            (target.path.clone(), target.params.clone())
        };
        let url = join(&self.base_url, &path)?;

        let mut request = HttpRequest::new(self.method, url);
        if let Some(params) = params {
            request.body = params.body;
            request.cache_policy = params.cache_policy;
            request.timeout = params.timeout;
            request.headers = params
                .headers
                .into_iter()
                .map(|h| (h.field, h.value))
                .collect();
        }
        Ok(request)
    }

    // A panic while holding the lock cannot leave `Target` half-written, so a
    // poisoned mutex is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn join(base_url: &str, path: &str) -> Result<Url, NetworkError> {
    Url::parse(&format!("{base_url}{path}")).map_err(|e| {
        tracing::debug!(base_url, path, error = %e, "malformed endpoint");
        NetworkError::malformed_target()
    })
}
