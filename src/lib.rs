//! Download a numbered media segment stream (`0.ts`, `1.ts`, ...) without a
//! manifest and remux it into a single file.
//!
//! [`DownloadCoordinator`] drives a job: an [`HttpProber`] discovers how many
//! segments exist, a [`SegmentFetcher`] downloads them two at a time, and an
//! [`FfmpegAssembler`] stream-copies them into the final artifact.

pub mod assembler;
pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod job;
pub mod prober;
pub mod progress;
pub mod template;
pub mod utils;

pub use assembler::{FfmpegAssembler, SegmentAssembler};
pub use cancel::CancellationToken;
pub use coordinator::{DownloadCoordinator, JobSettings};
pub use error::{AssemblyError, JobError, SegmentFailure};
pub use fetcher::{FetchPolicy, SegmentFetcher};
pub use job::{AssemblyManifest, FetchOutcome, JobReport, ProgressUpdate, SegmentDescriptor};
pub use prober::{HttpProber, ProbeSettings, SegmentProbe};
pub use progress::{NoProgress, ProgressSink, TerminalProgress};
pub use template::SegmentTemplate;
