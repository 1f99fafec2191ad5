//! Joins downloaded segments into one file with ffmpeg's concat demuxer.
//!
//! Streams are copied as-is; only the AAC bitstream is rewrapped
//! (`aac_adtstoasc`) so MPEG-TS audio fits in an MP4 container.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::AssemblyError;
use crate::job::AssemblyManifest;

pub const MANIFEST_FILE_NAME: &str = "segments.txt";

#[async_trait]
pub trait SegmentAssembler: Send + Sync {
    /// Concatenate `manifest` into `output`. On success the segment files and
    /// the concat list are deleted unless `keep_files` is set; on failure they
    /// are always left for inspection.
    async fn assemble(
        &self,
        manifest: &AssemblyManifest,
        output: &Path,
        keep_files: bool,
    ) -> Result<(), AssemblyError>;
}

pub struct FfmpegAssembler {
    ffmpeg: PathBuf,
}

impl FfmpegAssembler {
    /// `ffmpeg` may be a bare program name (looked up in `PATH`) or a path.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn resolve(&self) -> Result<PathBuf, AssemblyError> {
        which::which(&self.ffmpeg).map_err(|e| {
            debug!(ffmpeg = %self.ffmpeg.display(), error = %e, "ffmpeg lookup failed");
            AssemblyError::ToolUnavailable(self.ffmpeg.clone())
        })
    }
}

/// Concat demuxer list: one `file '<path>'` line per segment.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

fn list_path(manifest: &AssemblyManifest, output: &Path) -> PathBuf {
    let dir = manifest
        .paths()
        .first()
        .and_then(|p| p.parent())
        .or_else(|| output.parent())
        .unwrap_or_else(|| Path::new("."));
    dir.join(MANIFEST_FILE_NAME)
}

#[async_trait]
impl SegmentAssembler for FfmpegAssembler {
    async fn assemble(
        &self,
        manifest: &AssemblyManifest,
        output: &Path,
        keep_files: bool,
    ) -> Result<(), AssemblyError> {
        let ffmpeg = self.resolve()?;

        let list = list_path(manifest, output);
        fs::write(&list, concat_list(manifest.paths())).await?;

        info!(segments = manifest.len(), output = %output.display(), "Combining segments");
        let result = Command::new(&ffmpeg)
            .arg("-hide_banner")
            .arg("-n")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list)
            .args(["-c", "copy", "-bsf:a", "aac_adtstoasc"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            let diagnostic = String::from_utf8_lossy(&result.stderr).trim_end().to_string();
            warn!(status = %result.status, "ffmpeg failed, keeping segments");
            return Err(AssemblyError::ToolExecutionFailure {
                status: result.status.to_string(),
                diagnostic,
            });
        }

        if keep_files {
            debug!(list = %list.display(), "Keeping segments and concat list");
            return Ok(());
        }
        for path in manifest.paths() {
            if let Err(e) = fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "Could not remove segment");
            }
        }
        if let Err(e) = fs::remove_file(&list).await {
            debug!(path = %list.display(), error = %e, "Could not remove concat list");
        }
        Ok(())
    }
}
