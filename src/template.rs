//! Segment URL templates.
//!
//! The user pastes the URL of segment 0 (`.../0.ts?vid=...`). Every other
//! segment lives at the same URL with the index substituted for that `0`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Extensions accepted after the zero-index marker.
const SEGMENT_EXTENSIONS: &str = "ts|m4s|aac";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("not a valid http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("could not find a segment-0 marker (like '0.ts') in the URL path")]
    MissingMarker,
}

/// A URL with one substitution point for the segment index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    prefix: String,
    suffix: String,
    extension: String,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?:^|[^0-9])(0)\.({SEGMENT_EXTENSIONS})\b");
        Regex::new(&pattern).expect("marker regex is valid")
    })
}

impl SegmentTemplate {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let input = input.trim();
        let url = Url::parse(input).map_err(|e| TemplateError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(TemplateError::InvalidUrl(input.to_string()));
        }

        // Only the path may hold the marker; a `0.ts` in the host or query is data.
        let path_end = input.find(['?', '#']).unwrap_or(input.len());
        let path_start = input
            .find("://")
            .and_then(|i| input[i + 3..path_end].find('/').map(|j| i + 3 + j))
            .unwrap_or(path_end);
        let caps = marker_regex()
            .captures(&input[path_start..path_end])
            .ok_or(TemplateError::MissingMarker)?;
        let (Some(zero), Some(ext)) = (caps.get(1), caps.get(2)) else {
            return Err(TemplateError::MissingMarker);
        };

        let at = path_start + zero.start();
        Ok(Self {
            prefix: input[..at].to_string(),
            suffix: input[at + 1..].to_string(),
            extension: ext.as_str().to_string(),
        })
    }

    pub fn url_for(&self, index: usize) -> String {
        format!("{}{}{}", self.prefix, index, self.suffix)
    }

    /// Segment file extension, e.g. `ts`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.prefix_url())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// `scheme://host[:port]/` of the source.
    pub fn origin(&self) -> Option<String> {
        let url = Url::parse(&self.prefix_url()).ok()?;
        Some(format!("{}/", url.origin().ascii_serialization()))
    }

    fn prefix_url(&self) -> String {
        self.url_for(0)
    }
}

impl fmt::Display for SegmentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{index}}{}", self.prefix, self.suffix)
    }
}
