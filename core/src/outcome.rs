//! Values delivered at the end of a call.

use crate::error::NetworkError;
use crate::http::ResponseMeta;

/// Successful payload of a call together with the response metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub payload: T,
    pub meta: ResponseMeta,
}

impl<T> Response<T> {
    pub fn status(&self) -> Option<u16> {
        self.meta.status
    }
}

/// Terminal result handed to callback-style callers.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success { payload: T, meta: ResponseMeta },
    Failure(NetworkError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn into_result(self) -> Result<Response<T>, NetworkError> {
        match self {
            Outcome::Success { payload, meta } => Ok(Response { payload, meta }),
            Outcome::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<Response<T>, NetworkError>> for Outcome<T> {
    fn from(result: Result<Response<T>, NetworkError>) -> Self {
        match result {
            Ok(Response { payload, meta }) => Outcome::Success { payload, meta },
            Err(e) => Outcome::Failure(e),
        }
    }
}
