use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::DownloadError;

/// Output filename for `url` when the caller did not choose one.
pub fn get_filename_from_url(url_str: &str) -> Result<String, DownloadError> {
    let url = Url::parse(url_str).map_err(|err| DownloadError::Io {
        context: format!("Invalid URL {url_str}"),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
    })?;

    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.last() {
            let decoded = percent_decode_str(filename).decode_utf8_lossy();
            if !decoded.is_empty() {
                return Ok(sanitize_filename(&decoded));
            }
        }
    }

    // Fallback if no filename found in path
    Ok(format!("download_{}", uuid::Uuid::new_v4()))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

/// Directory holding the part files of `output`, next to it.
///
/// Named after the output filename up to its first `.`. A prefix that is
/// empty or the whole name would clash with the output, so `.parts` is
/// appended in that case.
pub fn part_dir_path(output: &Path) -> PathBuf {
    let name = file_name(output);
    let prefix = name.split('.').next().unwrap_or_default();
    let dir_name = if prefix.is_empty() || prefix == name {
        format!("{name}.parts")
    } else {
        prefix.to_string()
    };
    output.with_file_name(dir_name)
}

/// `<part_dir>/<output filename>-<index>`
pub fn part_file_path(part_dir: &Path, output: &Path, index: usize) -> PathBuf {
    part_dir.join(format!("{}-{}", file_name(output), index))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_url_segment() {
        let name = get_filename_from_url("https://example.com/pub/archive.tar.gz?x=1").unwrap();
        assert_eq!(name, "archive.tar.gz");
    }

    #[test]
    fn filename_falls_back_when_path_is_empty() {
        let name = get_filename_from_url("https://example.com/").unwrap();
        assert!(name.starts_with("download_"));
    }

    #[test]
    fn filename_is_decoded_before_sanitizing() {
        let name = get_filename_from_url("https://example.com/a%20b.bin").unwrap();
        assert_eq!(name, "a_b.bin");

        let name = get_filename_from_url("https://example.com/r%C3%A9sum%C3%A9.pdf").unwrap();
        assert_eq!(name, "résumé.pdf");
    }

    #[test]
    fn encoded_separators_cannot_escape_the_directory() {
        let name = get_filename_from_url("https://example.com/..%2F..%2Fetc%2Fpasswd").unwrap();
        assert_eq!(name, ".._.._etc_passwd");
    }

    #[test]
    fn invalid_url_is_an_error() {
        assert!(get_filename_from_url("not a url").is_err());
    }

    #[test]
    fn part_dir_uses_prefix_before_first_dot() {
        assert_eq!(part_dir_path(Path::new("archive.tar.gz")), PathBuf::from("archive"));
        assert_eq!(
            part_dir_path(Path::new("out/archive.tar.gz")),
            PathBuf::from("out/archive")
        );
    }

    #[test]
    fn part_dir_never_clashes_with_output() {
        assert_eq!(part_dir_path(Path::new("data")), PathBuf::from("data.parts"));
        assert_eq!(part_dir_path(Path::new(".bashrc")), PathBuf::from(".bashrc.parts"));
    }

    #[test]
    fn part_file_is_named_by_index() {
        let output = Path::new("out/archive.tar.gz");
        let dir = part_dir_path(output);
        assert_eq!(
            part_file_path(&dir, output, 3),
            PathBuf::from("out/archive/archive.tar.gz-3")
        );
    }
}
