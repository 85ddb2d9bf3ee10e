use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A transient local file holding downloaded or uploaded media for one
/// request.
///
/// The guard owns the file's lifetime: dropping it removes the file, which
/// covers error returns and task cancellation mid-workflow. The orderly path
/// calls [`ScratchFile::remove`] to delete asynchronously.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    len: u64,
    armed: bool,
}

impl ScratchFile {
    /// Reserve a collision-free path inside `dir` with the given extension.
    ///
    /// The file itself is not created; the caller streams content into
    /// `path()`. The guard is armed immediately so a failed or cancelled
    /// write still gets cleaned up.
    pub fn allocate(dir: &Path, extension: &str) -> Self {
        let token = &Uuid::new_v4().simple().to_string()[..12];
        Self {
            path: dir.join(format!("scratch_{token}.{extension}")),
            len: 0,
            armed: true,
        }
    }

    /// Persist a byte buffer to a fresh scratch file.
    pub async fn from_bytes(dir: &Path, extension: &str, bytes: &[u8]) -> crate::Result<Self> {
        let mut scratch = Self::allocate(dir, extension);
        tokio::fs::write(&scratch.path, bytes).await?;
        scratch.len = bytes.len() as u64;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, e.g. `scratch_3f9a2b71c04d.m4a`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scratch.bin".to_string())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record the byte length after content has been written.
    pub fn set_len(&mut self, len: u64) {
        self.len = len;
    }

    /// Delete the file and disarm the drop guard.
    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs_err::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch file on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, "Failed to remove scratch file on drop"),
        }
    }
}
