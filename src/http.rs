//! Shared HTTP client setup.
//!
//! Some segment hosts refuse requests that do not look like they came from
//! the player page, so every request carries a browser header set and a
//! `Referer` matching the source.

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;

use crate::template::SegmentTemplate;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Hosts whose segments are only served to the Yandex Disk player.
const YANDEX_REFERER: &str = "https://disk.yandex.com/";

pub fn referer_for(template: &SegmentTemplate) -> Option<String> {
    let host = template.host()?;
    if is_yandex_host(&host) {
        Some(YANDEX_REFERER.to_string())
    } else {
        template.origin()
    }
}

/// True when the registrable domain is `yandex.<tld>` (including two-part
/// suffixes like `yandex.com.tr`) or `yastatic.net`.
fn is_yandex_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    match labels.as_slice() {
        [.., "yastatic", "net"] => true,
        [.., "yandex", _tld] => true,
        [.., "yandex", "com" | "co", cc] => cc.len() == 2,
        _ => false,
    }
}

pub fn browser_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(value) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
        headers.insert(header::REFERER, value);
    }
    headers
}

/// One client per job; the prober and fetcher share its connection pool.
///
/// `Accept-Encoding` is left to reqwest so compressed bodies get decoded
/// before they reach the segment file.
pub fn build_client(referer: Option<&str>) -> Result<Client> {
    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(browser_headers(referer))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}
