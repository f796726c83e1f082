//! Local JPEG snapshot
//!
//! Overwrites a fixed path with the latest JPEG on every update, for
//! consumers that poll a file rather than a socket. The write is in place,
//! not an atomic rename, so a reader racing the writer can observe a
//! partially written file.
//!
//! Failures never propagate: the first one is reported at `warn`, repeats
//! only at `debug`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::error::Result;

/// Best-effort file snapshot writer
#[derive(Debug)]
pub struct FileSnapshotSink {
    path: PathBuf,
    announced_success: AtomicBool,
    reported_failure: AtomicBool,
}

impl FileSnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            announced_success: AtomicBool::new(false),
            reported_failure: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a write has failed at least once
    pub fn has_failed(&self) -> bool {
        self.reported_failure.load(Ordering::Relaxed)
    }

    /// Overwrite the snapshot with `jpeg`
    ///
    /// Returns the I/O error for the caller's accounting; it has already been
    /// logged.
    pub async fn write(&self, jpeg: &Bytes) -> Result<()> {
        match tokio::fs::write(&self.path, jpeg).await {
            Ok(()) => {
                if !self.announced_success.swap(true, Ordering::Relaxed) {
                    tracing::info!(path = %self.path.display(), "Local file saved");
                }
                Ok(())
            }
            Err(e) => {
                if !self.reported_failure.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to save local file"
                    );
                } else {
                    tracing::debug!(path = %self.path.display(), error = %e, "File write failed");
                }
                Err(e.into())
            }
        }
    }
}
