use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SegmentFailure;
use crate::template::SegmentTemplate;
use crate::utils::segment_file_name;

/// One segment to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub index: usize,
    pub url: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success {
        index: usize,
        path: PathBuf,
        bytes: u64,
    },
    PermanentFailure {
        index: usize,
        reason: SegmentFailure,
    },
    Cancelled {
        index: usize,
    },
}

impl FetchOutcome {
    pub fn index(&self) -> usize {
        match self {
            FetchOutcome::Success { index, .. }
            | FetchOutcome::PermanentFailure { index, .. }
            | FetchOutcome::Cancelled { index } => *index,
        }
    }
}

/// Snapshot handed to the progress sink after every completed segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub bytes_so_far: u64,
    /// Successes over completions so far, in `0.0..=1.0`.
    pub success_ratio: f64,
}

/// Segment files to concatenate, in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyManifest {
    paths: Vec<PathBuf>,
}

impl AssemblyManifest {
    #[cfg(test)]
    pub(crate) fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Aggregate state of the running job. Only the coordinator mutates it.
#[derive(Debug)]
pub struct DownloadJob {
    template: SegmentTemplate,
    target_count: usize,
    outcomes: BTreeMap<usize, FetchOutcome>,
    completed: usize,
    total_bytes: u64,
}

impl DownloadJob {
    pub fn new(template: SegmentTemplate, target_count: usize) -> Self {
        Self {
            template,
            target_count,
            outcomes: BTreeMap::new(),
            completed: 0,
            total_bytes: 0,
        }
    }

    pub fn descriptors(&self, work_dir: &Path) -> Vec<SegmentDescriptor> {
        (0..self.target_count)
            .map(|index| SegmentDescriptor {
                index,
                url: self.template.url_for(index),
                local_path: work_dir.join(segment_file_name(index, self.template.extension())),
            })
            .collect()
    }

    /// Record a finished fetch. A second outcome for the same index is ignored.
    pub fn record(&mut self, outcome: FetchOutcome) -> bool {
        let index = outcome.index();
        if index >= self.target_count || self.outcomes.contains_key(&index) {
            return false;
        }
        match &outcome {
            FetchOutcome::Success { bytes, .. } => {
                self.completed += 1;
                self.total_bytes += bytes;
            }
            FetchOutcome::PermanentFailure { .. } => self.completed += 1,
            FetchOutcome::Cancelled { .. } => {}
        }
        self.outcomes.insert(index, outcome);
        true
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, FetchOutcome::Success { .. }))
            .count()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .values()
            .filter_map(|o| match o {
                FetchOutcome::PermanentFailure { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> ProgressUpdate {
        let success_ratio = if self.completed == 0 {
            0.0
        } else {
            self.succeeded() as f64 / self.completed as f64
        };
        ProgressUpdate {
            completed: self.completed,
            total: self.target_count,
            bytes_so_far: self.total_bytes,
            success_ratio,
        }
    }

    /// Successful segment paths sorted by index, whatever order they finished in.
    pub fn manifest(&self) -> AssemblyManifest {
        let paths = self
            .outcomes
            .values()
            .filter_map(|o| match o {
                FetchOutcome::Success { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect();
        AssemblyManifest { paths }
    }
}

/// What a finished job hands back to the shell.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub output: PathBuf,
    pub probed_count: usize,
    pub target_count: usize,
    pub succeeded: usize,
    pub failed_indices: Vec<usize>,
    pub total_bytes: u64,
}

impl JobReport {
    pub fn is_degraded(&self) -> bool {
        !self.failed_indices.is_empty()
    }
}
