//! Filesystem capability used to place downloaded artifacts.

use std::future::Future;
use std::io;
use std::path::Path;

/// Moves a finished download to its destination.
pub trait Persist: Send + Sync + 'static {
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn move_or_copy(&self, src: &Path, dst: &Path) -> impl Future<Output = io::Result<()>> + Send;
}

/// Local filesystem via `tokio::fs`.
///
/// Tries a rename first and falls back to copy-then-remove when the rename
/// fails (typically because the temp directory is on another filesystem).
/// Missing parent directories are not created.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Persist for LocalFs {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn move_or_copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        match tokio::fs::rename(src, dst).await {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                tracing::trace!(error = %rename_err, "rename failed, copying instead");
                tokio::fs::copy(src, dst).await?;
                if let Err(e) = tokio::fs::remove_file(src).await {
                    tracing::debug!(path = %src.display(), error = %e, "leftover temp file");
                }
                Ok(())
            }
        }
    }
}
