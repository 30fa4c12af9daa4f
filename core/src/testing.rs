//! Scripted transport and filesystem doubles for unit tests.

use std::collections::VecDeque;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use url::Url;

use crate::http::{HttpRequest, ResponseMeta};
use crate::persist::{LocalFs, Persist};
use crate::progress::ProgressObserver;
use crate::transport::{Downloaded, TempArtifact, Transferred, Transport, TransportError};

/// One scripted transport reaction, consumed in order.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Reply { status: Option<u16>, body: Bytes },
    Fail { message: &'static str, status: Option<u16> },
    /// Never completes; only cancellation ends the call.
    Hang,
}

impl Scripted {
    pub(crate) fn reply(status: u16, body: &'static str) -> Self {
        Scripted::Reply {
            status: Some(status),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub(crate) fn reply_without_status(body: &'static str) -> Self {
        Scripted::Reply {
            status: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub(crate) fn fail(message: &'static str) -> Self {
        Scripted::Fail {
            message,
            status: None,
        }
    }

    pub(crate) fn fail_with_status(message: &'static str, status: u16) -> Self {
        Scripted::Fail {
            message,
            status: Some(status),
        }
    }
}

/// What the transport was asked to do.
#[derive(Debug, Clone)]
pub(crate) enum Call {
    Send(HttpRequest),
    Upload(HttpRequest, Bytes),
    Download(Url),
    Fetch(Url),
}

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn react(
        &self,
        call: Call,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        self.calls.lock().unwrap().push(call);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply { status, body }) => {
                if let Some(p) = progress {
                    p.notify(0.5);
                    p.notify(1.0);
                }
                Ok(Transferred {
                    body,
                    meta: ResponseMeta {
                        status,
                        url: None,
                        headers: Vec::new(),
                    },
                })
            }
            Some(Scripted::Fail { message, status }) => {
                Err(TransportError::new(message).with_status(status))
            }
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(TransportError::new("no scripted response left")),
        }
    }
}

impl Transport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        self.react(Call::Send(request), progress).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        body: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        self.react(Call::Upload(request, body), progress).await
    }

    async fn download(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> Result<Downloaded, TransportError> {
        let Transferred { body, meta } = self.react(Call::Download(url), progress).await?;
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&body)?;
        Ok(Downloaded {
            artifact: TempArtifact::new(file.into_temp_path()),
            meta,
        })
    }

    async fn fetch(
        &self,
        url: Url,
        progress: Option<ProgressObserver>,
    ) -> Result<Transferred, TransportError> {
        self.react(Call::Fetch(url), progress).await
    }
}

/// `LocalFs` that counts move attempts.
#[derive(Debug, Default)]
pub(crate) struct CountingFs {
    moves: AtomicUsize,
}

impl CountingFs {
    pub(crate) fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }
}

impl Persist for CountingFs {
    async fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path).await
    }

    async fn move_or_copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        LocalFs.move_or_copy(src, dst).await
    }
}
