use anyhow::{Context, Result};
use indicatif::HumanBytes;
use std::num::NonZeroUsize;

use crate::cli::Args;
use crate::downloader::Downloader;
use crate::plan::DownloadJob;

pub fn job_from_args(args: &Args) -> DownloadJob {
    let concurrency = args.concurrency.unwrap_or_else(default_concurrency);
    DownloadJob::new(args.url.clone(), args.output.clone(), concurrency)
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

pub async fn run_download(job: DownloadJob, show_progress: bool) -> Result<()> {
    let downloader = Downloader::new(job.concurrency).with_progress(show_progress);

    let summary = downloader
        .download(&job.url, job.output())
        .await
        .with_context(|| format!("Failed to download {}", job.url))?;

    match summary.parts {
        Some(parts) => println!(
            "Saved {} ({}, {} parts)",
            summary.path.display(),
            HumanBytes(summary.bytes),
            parts
        ),
        None => println!(
            "Saved {} ({}, single stream)",
            summary.path.display(),
            HumanBytes(summary.bytes)
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn concurrency_defaults_to_cpu_count() {
        let args = Args::try_parse_from(["prdl", "-u", "http://h/f.bin"]).unwrap();
        let job = job_from_args(&args);

        assert_eq!(job.concurrency.get(), num_cpus::get().max(1));
        assert_eq!(job.output(), None);
    }

    #[test]
    fn explicit_flags_reach_the_job() {
        let args = Args::try_parse_from(["prdl", "-u", "http://h/f.bin", "-o", "x.bin", "-n", "3"])
            .unwrap();
        let job = job_from_args(&args);

        assert_eq!(job.url, "http://h/f.bin");
        assert_eq!(job.output(), Some("x.bin"));
        assert_eq!(job.concurrency.get(), 3);
    }
}
