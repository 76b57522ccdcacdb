use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::num::NonZeroUsize;

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent HTTP file downloader", long_about = None)]
pub struct Args {
    /// URL to download
    #[arg(short = 'u', long)]
    pub url: String,

    /// Output filename (defaults to the last segment of the URL path)
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Number of concurrent range requests (defaults to number of logical CPUs)
    #[arg(short = 'n', long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Progress bar: auto (only on a terminal), on, off
    #[arg(long, value_enum, default_value = "auto")]
    pub progress: ProgressMode,

    /// Log debug output, including every part request
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    Auto,
    On,
    Off,
}

impl ProgressMode {
    pub fn enabled(self) -> bool {
        match self {
            ProgressMode::Auto => std::io::stderr().is_terminal(),
            ProgressMode::On => true,
            ProgressMode::Off => false,
        }
    }
}
