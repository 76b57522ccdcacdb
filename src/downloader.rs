use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::{header, Client, Response, StatusCode};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, ErrContext};
use crate::merge::merge_parts;
use crate::parts::{PartDir, PartFile};
use crate::plan::{plan_partitions, ContentPlan, PartitionRange};
use crate::utils::get_filename_from_url;

const TRANSFER_BUFFER_SIZE: usize = 32 * 1024;
const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}";

/// Outcome of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub path: PathBuf,
    pub bytes: u64,
    /// Number of ranged workers, `None` for a single-stream transfer.
    pub parts: Option<usize>,
}

pub struct Downloader {
    client: Client,
    concurrency: NonZeroUsize,
    show_progress: bool,
}

impl Downloader {
    pub fn new(concurrency: NonZeroUsize) -> Self {
        let client = Client::builder()
            .user_agent(concat!("prdl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            concurrency,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Downloads `url` into `output`, or into a file named after the URL.
    ///
    /// Uses `concurrency` ranged requests when the server accepts byte
    /// ranges, a single GET otherwise.
    pub async fn download(
        &self,
        url: &str,
        output: Option<&str>,
    ) -> Result<DownloadSummary, DownloadError> {
        let filename = match output {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => get_filename_from_url(url)?,
        };
        let path = PathBuf::from(filename);

        let plan = self.probe(url).await?;
        match plan.ranged_length() {
            Some(content_length) => {
                let bytes = self.download_multi_part(url, &path, content_length).await?;
                Ok(DownloadSummary {
                    path,
                    bytes,
                    parts: Some(self.concurrency.get()),
                })
            }
            None => {
                let bytes = self.download_single_stream(url, &path).await?;
                Ok(DownloadSummary {
                    path,
                    bytes,
                    parts: None,
                })
            }
        }
    }

    /// Metadata-only request telling whether `url` can be fetched in ranges.
    pub async fn probe(&self, url: &str) -> Result<ContentPlan, DownloadError> {
        let response = self.client.head(url).send().await?;

        let accepts_bytes = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .map_or(false, |value| value.as_bytes() == b"bytes");
        let supports_ranges = response.status() == StatusCode::OK && accepts_bytes;
        // Read the header itself: the body size hint of a HEAD response is 0.
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|_| supports_ranges);

        info!(
            url,
            status = %response.status(),
            supports_ranges,
            content_length,
            "Probed remote file"
        );
        Ok(ContentPlan {
            content_length,
            supports_ranges,
        })
    }

    async fn download_multi_part(
        &self,
        url: &str,
        output: &Path,
        content_length: u64,
    ) -> Result<u64, DownloadError> {
        // Removed when this function returns, merged or not.
        let part_dir = PartDir::create(output).await?;
        let ranges = plan_partitions(content_length, self.concurrency);
        info!(
            parts = ranges.len(),
            content_length,
            dir = %part_dir.path().display(),
            "Downloading in parts"
        );

        let pb = self.progress_bar(Some(content_length), output);
        let parts = match self.fetch_parts(url, &part_dir, ranges, &pb).await {
            Ok(parts) => parts,
            Err(err) => {
                pb.abandon_with_message(format!("Failed      {}", display_name(output)));
                return Err(err);
            }
        };

        pb.set_message(format!("Merging     {}", display_name(output)));
        let bytes = merge_parts(output, parts).await?;
        pb.finish_with_message(format!("Completed   {}", display_name(output)));
        info!(path = %output.display(), bytes, "Merged parts");

        Ok(bytes)
    }

    /// Runs one worker per range and waits for all of them.
    ///
    /// The first failing worker cancels the others; its error is returned
    /// once every worker has stopped.
    async fn fetch_parts(
        &self,
        url: &str,
        part_dir: &PartDir,
        ranges: Vec<PartitionRange>,
        pb: &ProgressBar,
    ) -> Result<Vec<PartFile>, DownloadError> {
        let cancel = CancellationToken::new();
        // Stops every worker if the caller drops this future mid-download.
        let _cancel_on_drop = cancel.clone().drop_guard();
        let mut handles: Vec<(usize, JoinHandle<Result<Option<PartFile>, DownloadError>>)> =
            Vec::with_capacity(ranges.len());

        for range in ranges {
            let client = self.client.clone();
            let url = url.to_string();
            let path = part_dir.part_path(range.index);
            let pb = pb.clone();
            let cancel = cancel.clone();
            let index = range.index;

            let handle = tokio::spawn(async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(DownloadError::Cancelled { index }),
                    result = fetch_part(&client, &url, range, path, &pb) => result,
                };
                if let Err(err) = &result {
                    if !err.is_cancelled() {
                        warn!(index, "Part failed, cancelling the others: {err}");
                        cancel.cancel();
                    }
                }
                result
            });
            handles.push((index, handle));
        }

        let mut parts = Vec::with_capacity(handles.len());
        let mut failure: Option<DownloadError> = None;
        for (index, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|source| Err(DownloadError::Worker { index, source }));
            match result {
                Ok(part) => parts.extend(part),
                Err(err) => {
                    cancel.cancel();
                    failure = match failure {
                        Some(first) if !first.is_cancelled() || err.is_cancelled() => Some(first),
                        _ => Some(err),
                    };
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(parts),
        }
    }

    async fn download_single_stream(&self, url: &str, output: &Path) -> Result<u64, DownloadError> {
        info!(url, "Server does not accept ranges, downloading in a single stream");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let pb = self.progress_bar(response.content_length(), output);
        let mut file = File::create(output)
            .await
            .context(format!("Failed to create output file {}", output.display()))?;
        let bytes = match copy_body(response, &mut file, &pb).await {
            Ok(bytes) => bytes,
            Err(err) => {
                pb.abandon_with_message(format!("Failed      {}", display_name(output)));
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(output).await {
                    warn!(path = %output.display(), "Failed to remove incomplete output: {remove_err}");
                }
                return Err(DownloadError::Io {
                    context: format!("Failed to download {url} into {}", output.display()),
                    source: err,
                });
            }
        };
        pb.finish_with_message(format!("Completed   {}", display_name(output)));

        Ok(bytes)
    }

    fn progress_bar(&self, total: Option<u64>, output: &Path) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(format!("Downloading {}", display_name(output)));
        pb
    }
}

/// Fetches one range into its part file. Empty ranges create nothing.
async fn fetch_part(
    client: &Client,
    url: &str,
    range: PartitionRange,
    path: PathBuf,
    pb: &ProgressBar,
) -> Result<Option<PartFile>, DownloadError> {
    if range.is_empty() {
        debug!(index = range.index, "Skipping empty range");
        return Ok(None);
    }

    debug!(index = range.index, start = range.start, end = range.end, "Fetching part");
    let mut file = File::create(&path)
        .await
        .context(format!("Failed to create part file {}", path.display()))?;

    let response = client
        .get(url)
        .header(header::RANGE, range.header_value())
        .send()
        .await?;
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let written = copy_body(response, &mut file, pb)
        .await
        .context(format!("Failed to download part {} into {}", range.index, path.display()))?;
    if written != range.len() {
        return Err(DownloadError::PartLength {
            index: range.index,
            written,
            expected: range.len(),
        });
    }

    debug!(index = range.index, bytes = written, "Part finished");
    Ok(Some(PartFile {
        index: range.index,
        path,
        len: written,
    }))
}

/// Streams a response body into `writer` through a fixed-size buffer.
async fn copy_body<W>(response: Response, writer: &mut W, pb: &ProgressBar) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let stream = response
        .bytes_stream()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
        .inspect_ok(|chunk| pb.inc(chunk.len() as u64));
    let mut reader = BufReader::with_capacity(TRANSFER_BUFFER_SIZE, StreamReader::new(stream));

    let written = tokio::io::copy_buf(&mut reader, writer).await?;
    writer.flush().await?;
    Ok(written)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
