//! Shared fakes for coordinator and pipeline tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use segdl::{
    AssemblyError, AssemblyManifest, CancellationToken, FetchPolicy, ProbeSettings, ProgressSink,
    ProgressUpdate, SegmentAssembler, SegmentProbe, SegmentTemplate,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SEGMENT_SIZE: usize = 2048;

pub fn fast_probe() -> ProbeSettings {
    ProbeSettings {
        delay: Duration::from_millis(1),
        first_timeout: Duration::from_secs(2),
        timeout: Duration::from_secs(2),
        ..ProbeSettings::default()
    }
}

pub fn fast_fetch() -> FetchPolicy {
    FetchPolicy {
        retry_delay: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
        ..FetchPolicy::default()
    }
}

pub fn template(server: &MockServer) -> SegmentTemplate {
    SegmentTemplate::parse(&format!("{}/hls/0.ts?vid=abc&tok=1", server.uri())).unwrap()
}

pub fn segment_body(index: usize) -> Vec<u8> {
    vec![index as u8; SEGMENT_SIZE]
}

/// Serve `indices` with a valid body; anything else falls through to 404.
pub async fn serve(server: &MockServer, indices: impl IntoIterator<Item = usize>) {
    for i in indices {
        Mock::given(method("GET"))
            .and(path(format!("/hls/{i}.ts")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(segment_body(i)))
            .mount(server)
            .await;
    }
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

/// Reports a fixed segment count without touching the network.
pub struct FixedProbe {
    pub count: usize,
    pub calls: AtomicUsize,
}

impl FixedProbe {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SegmentProbe for FixedProbe {
    async fn probe(
        &self,
        _template: &SegmentTemplate,
        upper_bound: usize,
        _cancel: &CancellationToken,
    ) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.count.min(upper_bound)
    }
}

/// Records each manifest and writes a stub output file.
#[derive(Default)]
pub struct RecordingAssembler {
    pub calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl RecordingAssembler {
    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentAssembler for RecordingAssembler {
    async fn assemble(
        &self,
        manifest: &AssemblyManifest,
        output: &Path,
        _keep_files: bool,
    ) -> Result<(), AssemblyError> {
        self.calls.lock().unwrap().push(manifest.paths().to_vec());
        std::fs::write(output, b"assembled")?;
        Ok(())
    }
}

/// Collects updates; optionally cancels the job after `cancel_after` of them.
#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<ProgressUpdate>>,
    pub cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingProgress {
    pub fn cancelling_after(n: usize, token: CancellationToken) -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            cancel_after: Some((n, token)),
        }
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn segment_completed(&self, update: ProgressUpdate) {
        let mut updates = self.updates.lock().unwrap();
        updates.push(update);
        if let Some((n, token)) = &self.cancel_after {
            if updates.len() >= *n {
                token.cancel();
            }
        }
    }
}

#[cfg(unix)]
pub fn install_fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Concatenates the listed segment files into the output, like a stream copy would.
pub const CONCATENATING_FFMPEG: &str = r#"#!/bin/sh
list=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then list="$arg"; fi
  prev="$arg"
done
sed -e "s/^file '//" -e "s/'\$//" "$list" | while read -r f; do cat "$f"; done > "$prev"
"#;
