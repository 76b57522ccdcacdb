use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{DownloadError, ErrContext};
use crate::utils::{part_dir_path, part_file_path};

/// Temporary directory holding the part files of one download.
///
/// Removed with everything in it when dropped, whichever way the
/// multi-part download exits.
#[derive(Debug)]
pub struct PartDir {
    path: PathBuf,
    output: PathBuf,
}

impl PartDir {
    /// Creates the part directory for `output`. An existing directory is
    /// never adopted, since dropping the guard would delete it.
    pub async fn create(output: &Path) -> Result<Self, DownloadError> {
        let path = part_dir_path(output);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(DownloadError::PartDirExists { path });
            }
            Err(err) => {
                return Err(DownloadError::Io {
                    context: format!("Failed to create part directory {}", path.display()),
                    source: err,
                })
            }
        }
        tracing::debug!(dir = %path.display(), "Created part directory");

        Ok(Self {
            path,
            output: output.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn part_path(&self, index: usize) -> PathBuf {
        part_file_path(&self.path, &self.output, index)
    }
}

impl Drop for PartDir {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(dir = %self.path.display(), "Failed to remove part directory: {err}");
            }
        }
    }
}

/// Bytes fetched by one worker, waiting to be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    pub index: usize,
    pub path: PathBuf,
    pub len: u64,
}

impl PartFile {
    pub async fn remove(&self) -> Result<(), DownloadError> {
        tokio::fs::remove_file(&self.path)
            .await
            .context(format!("Failed to remove part file {}", self.path.display()))
    }
}
