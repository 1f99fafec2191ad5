use anyhow::{bail, Context, Result};
use indicatif::HumanBytes;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::cli::ReportFormat;
use segdl::cancel::cancel_on_ctrl_c;
use segdl::http::{build_client, referer_for};
use segdl::utils::{default_output_dir, job_work_dir, next_output_name, normalize_output_name};
use segdl::{
    CancellationToken, DownloadCoordinator, FetchPolicy, FfmpegAssembler, HttpProber, JobReport,
    JobSettings, ProbeSettings, SegmentFetcher, SegmentTemplate, TerminalProgress,
};

pub struct DownloadRequest {
    pub url: String,
    pub max_segments: usize,
    pub output_dir: Option<PathBuf>,
    pub output_name: Option<String>,
    pub ffmpeg: PathBuf,
    pub workers: usize,
    pub referer: Option<String>,
    pub keep_temp: bool,
}

pub async fn run_download(request: DownloadRequest) -> Result<JobReport> {
    let template = SegmentTemplate::parse(&request.url)
        .context("Could not extract the URL pattern; paste a segment URL containing '0.ts'")?;

    let output_dir = request.output_dir.unwrap_or_else(default_output_dir);
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)
            .await
            .context("Failed to create output directory")?;
    }
    let output_name = match request.output_name {
        Some(name) => normalize_output_name(&name),
        None => next_output_name(&output_dir),
    };
    let output = output_dir.join(&output_name);
    if output.exists() {
        bail!("Output file already exists: {:?}", output);
    }

    // Fail before spending bandwidth if the final step cannot run.
    let assembler = FfmpegAssembler::new(request.ffmpeg);
    assembler.resolve()?;

    let referer = request.referer.or_else(|| referer_for(&template));
    let client = build_client(referer.as_deref())?;

    let settings = JobSettings {
        max_segments: request.max_segments,
        workers: request.workers,
        output,
        work_dir: job_work_dir(&output_dir, &output_name),
        keep_temp: request.keep_temp,
    };
    info!(template = %template, output = ?settings.output, max_segments = settings.max_segments, "Starting download");

    let coordinator = DownloadCoordinator::new(
        Arc::new(HttpProber::new(client.clone(), ProbeSettings::default())),
        SegmentFetcher::new(client, FetchPolicy::default()),
        Arc::new(assembler),
        Arc::new(TerminalProgress::new()),
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    eprintln!("Press Ctrl+C to cancel at any time");

    let report = coordinator.run(&template, &settings, &cancel).await?;
    Ok(report)
}

pub fn print_report(report: &JobReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        ReportFormat::Text => {
            println!(
                "Results: {}/{} segments downloaded successfully ({})",
                report.succeeded,
                report.target_count,
                HumanBytes(report.total_bytes)
            );
            if report.is_degraded() {
                println!(
                    "Warning: {} segments failed to download (indices {:?}); the video has gaps",
                    report.failed_indices.len(),
                    report.failed_indices
                );
            }
            println!("Video saved to: {}", report.output.display());
        }
    }
    Ok(())
}
