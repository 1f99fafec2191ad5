//! Runs one download job: probe, fetch in parallel, assemble.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::assembler::SegmentAssembler;
use crate::cancel::CancellationToken;
use crate::error::{JobError, SegmentFailure};
use crate::fetcher::SegmentFetcher;
use crate::job::{DownloadJob, FetchOutcome, JobReport};
use crate::progress::ProgressSink;
use crate::prober::SegmentProbe;
use crate::template::SegmentTemplate;

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub max_segments: usize,
    /// Parallel fetches. Kept small; sources rate-limit aggressive clients.
    pub workers: usize,
    pub output: PathBuf,
    /// Holds segment files and the concat list until assembly succeeds.
    pub work_dir: PathBuf,
    pub keep_temp: bool,
}

impl JobSettings {
    pub const DEFAULT_WORKERS: usize = 2;
    pub const DEFAULT_MAX_SEGMENTS: usize = 200;
}

pub struct DownloadCoordinator {
    prober: Arc<dyn SegmentProbe>,
    fetcher: SegmentFetcher,
    assembler: Arc<dyn SegmentAssembler>,
    progress: Arc<dyn ProgressSink>,
}

impl DownloadCoordinator {
    pub fn new(
        prober: Arc<dyn SegmentProbe>,
        fetcher: SegmentFetcher,
        assembler: Arc<dyn SegmentAssembler>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            prober,
            fetcher,
            assembler,
            progress,
        }
    }

    pub async fn run(
        &self,
        template: &SegmentTemplate,
        settings: &JobSettings,
        cancel: &CancellationToken,
    ) -> Result<JobReport, JobError> {
        if settings.max_segments == 0 {
            return Err(JobError::NoSegmentsFound);
        }
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        self.progress.probe_started();
        let probed = self
            .prober
            .probe(template, settings.max_segments, cancel)
            .await;
        self.progress.probe_finished(probed);
        if cancel.is_cancelled() {
            warn!("Cancelled during segment detection");
            return Err(JobError::Cancelled);
        }
        if probed == 0 {
            return Err(JobError::SourceInvalid);
        }

        let target_count = probed.min(settings.max_segments);
        if target_count < settings.max_segments {
            info!(
                found = target_count,
                requested = settings.max_segments,
                "Fewer segments available than requested, downloading what exists"
            );
        }

        fs::create_dir_all(&settings.work_dir).await?;
        let mut job = DownloadJob::new(template.clone(), target_count);
        self.download_all(&mut job, settings, cancel).await?;

        let failed_indices = job.failed_indices();
        info!(
            succeeded = job.succeeded(),
            total = target_count,
            failed = failed_indices.len(),
            bytes = job.total_bytes(),
            "Download finished"
        );
        if job.succeeded() == 0 {
            return Err(JobError::NoSegmentsDownloaded(target_count));
        }
        if cancel.is_cancelled() {
            warn!("Cancelled before combining segments");
            return Err(JobError::Cancelled);
        }

        let manifest = job.manifest();
        self.progress.assembly_started(manifest.len());
        self.assembler
            .assemble(&manifest, &settings.output, settings.keep_temp)
            .await
            .map_err(|e| JobError::from_assembly(e, settings.work_dir.clone()))?;

        if !settings.keep_temp {
            if let Err(e) = fs::remove_dir_all(&settings.work_dir).await {
                warn!(dir = %settings.work_dir.display(), error = %e, "Could not remove temp dir");
            }
        }
        info!(output = %settings.output.display(), "Video saved");

        Ok(JobReport {
            output: settings.output.clone(),
            probed_count: probed,
            target_count,
            succeeded: job.succeeded(),
            failed_indices,
            total_bytes: job.total_bytes(),
        })
    }

    /// Fetch every segment of `job` through a fixed number of workers,
    /// recording outcomes as they arrive.
    async fn download_all(
        &self,
        job: &mut DownloadJob,
        settings: &JobSettings,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let semaphore = Arc::new(Semaphore::new(settings.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut indices = HashMap::new();

        for descriptor in job.descriptors(&settings.work_dir) {
            let index = descriptor.index;
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FetchOutcome::Cancelled {
                        index: descriptor.index,
                    };
                };
                fetcher.fetch(&descriptor, &cancel).await
            });
            indices.insert(handle.id(), index);
        }

        loop {
            if cancel.is_cancelled() {
                warn!(
                    completed = job.completed(),
                    total = job.target_count(),
                    "Download cancelled by user"
                );
                // Queued tasks see a closed semaphore and return without fetching.
                semaphore.close();
                tasks.shutdown().await;
                return Err(JobError::Cancelled);
            }

            let joined = tokio::select! {
                joined = tasks.join_next_with_id() => joined,
                _ = cancel.cancelled() => continue,
            };
            let Some(joined) = joined else {
                break;
            };

            let Some(outcome) = joined_outcome(joined, &indices) else {
                continue;
            };
            let counted = !matches!(outcome, FetchOutcome::Cancelled { .. });
            if job.record(outcome) && counted {
                self.progress.segment_completed(job.progress());
            }
        }

        Ok(())
    }
}

/// Turn a joined task into its outcome. A task that panicked still yields a
/// `PermanentFailure` for its index so every segment is accounted for.
fn joined_outcome(
    joined: Result<(task::Id, FetchOutcome), JoinError>,
    indices: &HashMap<task::Id, usize>,
) -> Option<FetchOutcome> {
    match joined {
        Ok((_, outcome)) => Some(outcome),
        Err(e) => {
            let index = *indices.get(&e.id())?;
            error!(index, error = %e, "Segment task did not finish");
            if e.is_cancelled() {
                Some(FetchOutcome::Cancelled { index })
            } else {
                Some(FetchOutcome::PermanentFailure {
                    index,
                    reason: SegmentFailure::TaskFailed(e.to_string()),
                })
            }
        }
    }
}
