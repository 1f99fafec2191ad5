use std::path::PathBuf;

use thiserror::Error;

/// Why a single segment could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentFailure {
    #[error("segment not found (HTTP 404)")]
    NotFound,
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("body too small ({0} bytes)")]
    TooSmall(u64),
    #[error("network error: {0}")]
    Network(String),
    #[error("write error: {0}")]
    Io(String),
    #[error("segment task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("ffmpeg not found at {}", .0.display())]
    ToolUnavailable(PathBuf),
    #[error("ffmpeg exited with {status}:\n{diagnostic}")]
    ToolExecutionFailure { status: String, diagnostic: String },
    #[error("assembly i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Job-level failures. Every variant is fatal for the job it came from.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no segments detected: the first segment is unreachable, the URL may be invalid or expired (grab a fresh one from the browser's Network tab)")]
    SourceInvalid,
    #[error("no segments detected: the segment limit allows nothing to download")]
    NoSegmentsFound,
    #[error("no segments downloaded: all {0} segments failed (try a fresh URL from the browser's Network tab)")]
    NoSegmentsDownloaded(usize),
    #[error("ffmpeg not found at {}", .0.display())]
    ToolUnavailable(PathBuf),
    #[error("combining segments failed, temporary files kept in {}: ffmpeg exited with {status}:\n{diagnostic}", .work_dir.display())]
    ToolExecutionFailure {
        status: String,
        diagnostic: String,
        work_dir: PathBuf,
    },
    #[error("download cancelled by user")]
    Cancelled,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn from_assembly(err: AssemblyError, work_dir: PathBuf) -> Self {
        match err {
            AssemblyError::ToolUnavailable(path) => JobError::ToolUnavailable(path),
            AssemblyError::ToolExecutionFailure { status, diagnostic } => {
                JobError::ToolExecutionFailure {
                    status,
                    diagnostic,
                    work_dir,
                }
            }
            AssemblyError::Io(e) => JobError::Io(e),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}
