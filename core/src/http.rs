//! HTTP request and response descriptions handed to a [`Transport`].
//!
//! # Design
//! These types describe a concrete request and the metadata of its response
//! as plain data. The pipeline builds an `HttpRequest` from an `Endpoint`
//! and the transport turns it into network I/O, so the pipeline itself never
//! depends on a particular HTTP client.
//!
//! `ResponseMeta::status` is optional: a transport talking to a non-HTTP
//! resource has no status code to report, and that is a legitimate value.
//!
//! [`Transport`]: crate::transport::Transport

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
    Query,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Query => "QUERY",
        }
    }

    /// Whether the method may carry an upload payload.
    pub fn allows_upload(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache behaviour requested for a single request. Forwarded to the
/// transport untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    UseProtocol,
    ReloadIgnoringLocalCache,
    ReturnCacheElseLoad,
    ReturnCacheDontLoad,
}

/// A concrete HTTP request described as plain data.
///
/// Headers are kept in insertion order as `(field, value)` pairs and are
/// never deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub cache_policy: Option<CachePolicy>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            cache_policy: None,
            timeout: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }
}

/// Metadata of a response as reported by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status, when the response exposes one.
    pub status: Option<u16>,
    /// Final URL after any redirects the transport followed.
    pub url: Option<Url>,
    pub headers: Vec<(String, String)>,
}

impl ResponseMeta {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// First header value whose name matches `name`, compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
