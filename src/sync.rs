//! Artifact mirroring boundary
//!
//! The pipeline mirrors its output directory after each stage transition
//! through this interface. The real client (object storage, rsync target)
//! is swappable; the pipeline only requires that sync failures are
//! reportable and never fatal.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync failed for {path}: {message}")]
    Failed { path: String, message: String },
}

/// Mirrors a local path to an external store
pub trait ArtifactSync: Send + Sync {
    fn sync(&self, local_path: &Path) -> Result<(), SyncError>;
}

/// Sync implementation that does nothing (the default)
pub struct NoopSync;

impl ArtifactSync for NoopSync {
    fn sync(&self, _local_path: &Path) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Sync implementation that records requested paths (for tests)
#[derive(Default)]
pub struct RecordingSync {
    paths: Mutex<Vec<PathBuf>>,
}

impl RecordingSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synced_paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

impl ArtifactSync for RecordingSync {
    fn sync(&self, local_path: &Path) -> Result<(), SyncError> {
        self.paths.lock().unwrap().push(local_path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sync_succeeds() {
        assert!(NoopSync.sync(Path::new("/tmp/anything")).is_ok());
    }

    #[test]
    fn test_recording_sync_captures_paths() {
        let sync = RecordingSync::new();
        sync.sync(Path::new("/data/job1")).unwrap();
        sync.sync(Path::new("/data/job1")).unwrap();
        assert_eq!(sync.synced_paths().len(), 2);
    }
}
