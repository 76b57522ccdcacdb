use std::num::NonZeroUsize;

/// One invocation of the downloader, as requested by the caller.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    /// Empty means "derive from the URL".
    pub output: String,
    pub concurrency: NonZeroUsize,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, output: Option<String>, concurrency: NonZeroUsize) -> Self {
        Self {
            url: url.into(),
            output: output.unwrap_or_default(),
            concurrency,
        }
    }

    pub fn output(&self) -> Option<&str> {
        if self.output.is_empty() {
            None
        } else {
            Some(self.output.as_str())
        }
    }
}

/// What the capability probe learned about the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentPlan {
    /// Only set when the server also advertised byte ranges.
    pub content_length: Option<u64>,
    pub supports_ranges: bool,
}

impl ContentPlan {
    /// The length to split, if a multi-part download is possible.
    pub fn ranged_length(&self) -> Option<u64> {
        if self.supports_ranges {
            self.content_length
        } else {
            None
        }
    }
}

/// Byte interval `[start, end)` fetched by worker `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl PartitionRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `Range` header value. HTTP ranges are inclusive on both ends.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Splits `content_length` bytes into `concurrency` contiguous ranges.
///
/// Every range is `content_length / concurrency` bytes long except the last,
/// which always ends at `content_length` and so absorbs the remainder. When
/// there are fewer bytes than workers the leading ranges are empty.
pub fn plan_partitions(content_length: u64, concurrency: NonZeroUsize) -> Vec<PartitionRange> {
    let n = concurrency.get();
    let part_size = content_length / n as u64;

    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for index in 0..n {
        let end = if index == n - 1 {
            content_length
        } else {
            start + part_size
        };
        ranges.push(PartitionRange { index, start, end });
        start = end;
    }
    ranges
}
