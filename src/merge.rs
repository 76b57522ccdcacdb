use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{DownloadError, ErrContext};
use crate::parts::PartFile;

/// Concatenates `parts` into `output` in ascending index order, deleting
/// each part once it has been copied. Returns the number of bytes written.
///
/// On error whatever was already appended stays in `output`.
pub async fn merge_parts(output: &Path, mut parts: Vec<PartFile>) -> Result<u64, DownloadError> {
    parts.sort_by_key(|part| part.index);

    let mut dest = File::create(output)
        .await
        .context(format!("Failed to create output file {}", output.display()))?;

    let mut total = 0;
    for part in &parts {
        let mut src = File::open(&part.path)
            .await
            .context(format!("Failed to open part file {}", part.path.display()))?;
        let copied = tokio::io::copy(&mut src, &mut dest)
            .await
            .context(format!("Failed to append part {} to {}", part.index, output.display()))?;
        drop(src);

        tracing::debug!(index = part.index, bytes = copied, planned = part.len, "Merged part");
        total += copied;
        part.remove().await?;
    }

    dest.flush()
        .await
        .context(format!("Failed to flush output file {}", output.display()))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_part(dir: &Path, index: usize, bytes: &[u8]) -> PartFile {
        let path = dir.join(format!("out.bin-{index}"));
        std::fs::write(&path, bytes).unwrap();
        PartFile {
            index,
            path,
            len: bytes.len() as u64,
        }
    }

    #[tokio::test]
    async fn parts_are_joined_by_index_not_creation_order() {
        let tmp = TempDir::new().unwrap();
        let p2 = write_part(tmp.path(), 2, b"ghi");
        let p0 = write_part(tmp.path(), 0, b"abc");
        let p1 = write_part(tmp.path(), 1, b"def");
        let output = tmp.path().join("out.bin");

        let written = merge_parts(&output, vec![p1.clone(), p2.clone(), p0.clone()])
            .await
            .unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&output).unwrap(), b"abcdefghi");
        for part in [p0, p1, p2] {
            assert!(!part.path.exists());
        }
    }

    #[tokio::test]
    async fn existing_output_is_truncated() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("out.bin");
        std::fs::write(&output, b"stale content that is longer").unwrap();
        let p0 = write_part(tmp.path(), 0, b"new");

        merge_parts(&output, vec![p0]).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"new");
    }

    #[tokio::test]
    async fn no_parts_gives_an_empty_file() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("empty.bin");

        assert_eq!(merge_parts(&output, vec![]).await.unwrap(), 0);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_part_aborts_and_keeps_what_was_merged() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("out.bin");
        let p0 = write_part(tmp.path(), 0, b"abc");
        let missing = PartFile {
            index: 1,
            path: tmp.path().join("out.bin-1"),
            len: 3,
        };

        let err = merge_parts(&output, vec![p0, missing]).await.unwrap_err();

        assert!(matches!(err, DownloadError::Io { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn uncreatable_output_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("no-such-dir").join("out.bin");

        let err = merge_parts(&output, vec![]).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to create output file"));
    }
}
