use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;

/// Errors returned by [`Downloader::download`](crate::downloader::Downloader::download).
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Request to the remote server failed")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("{context}")]
    Io { context: String, source: io::Error },

    #[error("Part directory {path:?} already exists, refusing to reuse it")]
    PartDirExists { path: PathBuf },

    #[error("Part {index} received {written} bytes, expected {expected}")]
    PartLength {
        index: usize,
        written: u64,
        expected: u64,
    },

    #[error("Worker {index} did not finish")]
    Worker {
        index: usize,
        source: tokio::task::JoinError,
    },

    #[error("Part {index} was cancelled after a sibling failed")]
    Cancelled { index: usize },
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled { .. })
    }
}

/// Attaches a context string to io-like errors, `anyhow`-style, while
/// keeping the error typed.
pub(crate) trait ErrContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T, DownloadError>;
}

impl<T, E: Into<io::Error>> ErrContext<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, DownloadError> {
        self.map_err(|err| DownloadError::Io {
            context: context.into(),
            source: err.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_context_is_the_display_message() {
        let res: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::NotFound));
        let err = res.context("Failed to open part file a-0").unwrap_err();

        assert_eq!(err.to_string(), "Failed to open part file a-0");
        assert!(matches!(err, DownloadError::Io { ref source, .. } if source.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn only_cancelled_reports_cancelled() {
        assert!(DownloadError::Cancelled { index: 2 }.is_cancelled());
        assert!(!DownloadError::PartDirExists { path: "x".into() }.is_cancelled());
    }
}
