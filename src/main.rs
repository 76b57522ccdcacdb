mod cli;
mod commands;
mod downloader;
mod error;
mod logging;
mod merge;
mod parts;
mod plan;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(err) = logging::init(args.verbose) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let job = commands::job_from_args(&args);
    let show_progress = args.progress.enabled();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { commands::run_download(job, show_progress).await })
}
