mod cli;
mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cli::ReportFormat;
use crate::commands::DownloadRequest;
use segdl::{JobError, JobSettings};

/// Exit code for a run stopped with Ctrl+C.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the first segment, e.g. https://host/.../0.ts?vid=...
    #[arg(index = 1)]
    url: String,

    /// Upper bound on the number of segments to download
    #[arg(short = 'm', long, default_value_t = JobSettings::DEFAULT_MAX_SEGMENTS)]
    max_segments: usize,

    /// Directory receiving the final video (defaults to the user's Downloads folder)
    #[arg(short = 'd', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// File name for the final video (defaults to the next free downloaded_NNN.mp4)
    #[arg(short = 'o', long = "output-name")]
    output_name: Option<String>,

    /// ffmpeg executable, either a path or a name looked up in PATH
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Number of segments fetched in parallel
    #[arg(short = 'c', long, default_value_t = JobSettings::DEFAULT_WORKERS)]
    workers: usize,

    /// Referer sent with every request (defaults to one matching the source host)
    #[arg(long)]
    referer: Option<String>,

    /// Keep the temporary segment directory after a successful run
    #[arg(long)]
    keep_temp: bool,

    /// Report format printed when the job finishes
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,

    /// More log output (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_directive = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "segdl=info",
        (false, _) => "segdl=debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let request = DownloadRequest {
        url: args.url,
        max_segments: args.max_segments,
        output_dir: args.output_dir,
        output_name: args.output_name,
        ffmpeg: args.ffmpeg,
        workers: args.workers,
        referer: args.referer,
        keep_temp: args.keep_temp,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(crate::commands::run_download(request));

    match result {
        Ok(report) => crate::commands::print_report(&report, args.format),
        Err(e) => {
            if matches!(e.downcast_ref::<JobError>(), Some(JobError::Cancelled)) {
                eprintln!("Download was cancelled.");
                std::process::exit(EXIT_CANCELLED);
            }
            Err(e)
        }
    }
}
