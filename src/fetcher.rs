//! Downloads a single segment to disk with retries.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::SegmentFailure;
use crate::job::{FetchOutcome, SegmentDescriptor};

/// Cloudflare's "origin timed out"; the segment usually shows up on retry.
const STATUS_ORIGIN_TIMEOUT: u16 = 524;

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    /// Anything smaller is an error page served with a 200, not a segment.
    pub min_valid_size: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            min_valid_size: 1000,
        }
    }
}

enum Attempt {
    Done(u64),
    Retry(SegmentFailure),
    GiveUp(SegmentFailure),
}

#[derive(Clone)]
pub struct SegmentFetcher {
    client: Client,
    policy: FetchPolicy,
}

impl SegmentFetcher {
    pub fn new(client: Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn fetch(
        &self,
        descriptor: &SegmentDescriptor,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let index = descriptor.index;

        // Left over from an earlier run; size is the only check.
        if let Some(bytes) = self.existing_size(&descriptor.local_path).await {
            debug!(index, bytes, "Segment already on disk, skipping");
            return FetchOutcome::Success {
                index,
                path: descriptor.local_path.clone(),
                bytes,
            };
        }

        let mut last_failure = SegmentFailure::Network("no attempt made".to_string());
        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return FetchOutcome::Cancelled { index };
            }

            match self.attempt(descriptor).await {
                Attempt::Done(bytes) => {
                    return FetchOutcome::Success {
                        index,
                        path: descriptor.local_path.clone(),
                        bytes,
                    };
                }
                Attempt::GiveUp(reason) => {
                    warn!(index, %reason, "Segment permanently unavailable");
                    return FetchOutcome::PermanentFailure { index, reason };
                }
                Attempt::Retry(reason) => {
                    if attempt < self.policy.max_attempts {
                        warn!(index, attempt, %reason, "Segment fetch failed, retrying");
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                    last_failure = reason;
                }
            }
        }

        warn!(index, reason = %last_failure, "Segment failed after all attempts");
        FetchOutcome::PermanentFailure {
            index,
            reason: last_failure,
        }
    }

    async fn existing_size(&self, path: &Path) -> Option<u64> {
        let metadata = fs::metadata(path).await.ok()?;
        (metadata.is_file() && metadata.len() > self.policy.min_valid_size)
            .then(|| metadata.len())
    }

    async fn attempt(&self, descriptor: &SegmentDescriptor) -> Attempt {
        let response = match self
            .client
            .get(&descriptor.url)
            .timeout(self.policy.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(SegmentFailure::Network(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Attempt::GiveUp(SegmentFailure::NotFound);
        }
        if !status.is_success() {
            if status.as_u16() == STATUS_ORIGIN_TIMEOUT {
                debug!(index = descriptor.index, "Origin timeout");
            }
            return Attempt::Retry(SegmentFailure::Status(status.as_u16()));
        }

        // Every attempt starts the file over.
        let mut file = match File::create(&descriptor.local_path).await {
            Ok(f) => f,
            Err(e) => return Attempt::Retry(SegmentFailure::Io(e.to_string())),
        };
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(c) => c,
                Err(e) => return Attempt::Retry(SegmentFailure::Network(e.to_string())),
            };
            if let Err(e) = file.write_all(&chunk).await {
                return Attempt::Retry(SegmentFailure::Io(e.to_string()));
            }
            written += chunk.len() as u64;
        }
        if let Err(e) = file.flush().await {
            return Attempt::Retry(SegmentFailure::Io(e.to_string()));
        }

        if written < self.policy.min_valid_size {
            return Attempt::Retry(SegmentFailure::TooSmall(written));
        }
        Attempt::Done(written)
    }
}
