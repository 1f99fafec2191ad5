//! Segment count discovery.
//!
//! There is no manifest, so the only way to learn how long the stream is
//! is to ask for segments one at a time until the server stops answering.
//! Requests are sequential and spaced out; hammering the host gets the
//! session throttled or blocked.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::template::SegmentTemplate;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Never look past this many segments.
    pub hard_cap: usize,
    pub delay: Duration,
    pub first_timeout: Duration,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            hard_cap: 30,
            delay: Duration::from_millis(100),
            first_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
pub trait SegmentProbe: Send + Sync {
    /// Number of consecutive segments available from index 0, at most
    /// `min(upper_bound, hard cap)`. Zero means the source is invalid or expired.
    async fn probe(
        &self,
        template: &SegmentTemplate,
        upper_bound: usize,
        cancel: &CancellationToken,
    ) -> usize;
}

pub struct HttpProber {
    client: Client,
    settings: ProbeSettings,
}

impl HttpProber {
    pub fn new(client: Client, settings: ProbeSettings) -> Self {
        Self { client, settings }
    }

    /// A segment exists if it answers 200 and sends at least one byte.
    async fn segment_exists(&self, url: &str, timeout: Duration) -> bool {
        let mut response = match self.client.get(url).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "Probe request failed");
                return false;
            }
        };
        if response.status() != StatusCode::OK {
            debug!(url, status = %response.status(), "Probe hit non-200");
            return false;
        }
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) if !chunk.is_empty() => return true,
                Ok(Some(_)) => continue,
                Ok(None) => {
                    debug!(url, "Probe got an empty body");
                    return false;
                }
                Err(e) => {
                    debug!(url, error = %e, "Probe body read failed");
                    return false;
                }
            }
        }
    }
}

#[async_trait]
impl SegmentProbe for HttpProber {
    async fn probe(
        &self,
        template: &SegmentTemplate,
        upper_bound: usize,
        cancel: &CancellationToken,
    ) -> usize {
        let limit = upper_bound.min(self.settings.hard_cap);
        if limit == 0 || cancel.is_cancelled() {
            return 0;
        }

        info!("Detecting available segments");
        if !self
            .segment_exists(&template.url_for(0), self.settings.first_timeout)
            .await
        {
            warn!("First segment not found, the URL may be invalid or expired");
            return 0;
        }

        let mut found = 1;
        for index in 1..limit {
            tokio::time::sleep(self.settings.delay).await;
            if cancel.is_cancelled() {
                debug!(found, "Probe interrupted by cancellation");
                break;
            }
            if !self
                .segment_exists(&template.url_for(index), self.settings.timeout)
                .await
            {
                break;
            }
            found = index + 1;
        }

        info!(found, "Segment detection finished");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Serves a valid segment and cancels the job while doing so.
    struct CancelWhileServing(CancellationToken);

    impl Respond for CancelWhileServing {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.0.cancel();
            ResponseTemplate::new(200).set_body_bytes(vec![0x47u8; 188])
        }
    }

    fn fast_settings() -> ProbeSettings {
        ProbeSettings {
            delay: Duration::from_millis(1),
            first_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
            ..ProbeSettings::default()
        }
    }

    async fn serve_segments(server: &MockServer, count: usize) {
        for i in 0..count {
            Mock::given(method("GET"))
                .and(path(format!("/v/{i}.ts")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x47u8; 188]))
                .mount(server)
                .await;
        }
    }

    fn template(server: &MockServer) -> SegmentTemplate {
        SegmentTemplate::parse(&format!("{}/v/0.ts?vid=abc", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn stops_at_first_missing_segment() {
        let server = MockServer::start().await;
        serve_segments(&server, 5).await;

        let prober = HttpProber::new(Client::new(), fast_settings());
        let found = prober
            .probe(&template(&server), 200, &CancellationToken::new())
            .await;
        assert_eq!(found, 5);
    }

    #[tokio::test]
    async fn empty_body_ends_the_stream() {
        let server = MockServer::start().await;
        serve_segments(&server, 3).await;
        Mock::given(method("GET"))
            .and(path("/v/3.ts"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        serve_segments(&server, 6).await;

        let prober = HttpProber::new(Client::new(), fast_settings());
        let found = prober
            .probe(&template(&server), 200, &CancellationToken::new())
            .await;
        assert_eq!(found, 3);
    }

    #[tokio::test]
    async fn respects_upper_bound_and_cap() {
        let server = MockServer::start().await;
        serve_segments(&server, 40).await;
        let prober = HttpProber::new(Client::new(), fast_settings());
        let cancel = CancellationToken::new();

        assert_eq!(prober.probe(&template(&server), 4, &cancel).await, 4);
        assert_eq!(prober.probe(&template(&server), 200, &cancel).await, 30);
        assert_eq!(prober.probe(&template(&server), 0, &cancel).await, 0);
    }

    #[tokio::test]
    async fn missing_first_segment_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let prober = HttpProber::new(Client::new(), fast_settings());
        let found = prober
            .probe(&template(&server), 200, &CancellationToken::new())
            .await;
        assert_eq!(found, 0);
    }

    #[tokio::test]
    async fn sends_configured_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/0.ts"))
            .and(header("referer", "https://disk.yandex.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;

        let client = crate::http::build_client(Some("https://disk.yandex.com/")).unwrap();
        let prober = HttpProber::new(client, fast_settings());
        let found = prober
            .probe(&template(&server), 200, &CancellationToken::new())
            .await;
        assert_eq!(found, 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let prober = HttpProber::new(Client::new(), fast_settings());
        assert_eq!(prober.probe(&template(&server), 10, &cancel).await, 0);
    }

    #[tokio::test]
    async fn timed_out_segment_ends_the_stream() {
        let server = MockServer::start().await;
        serve_segments(&server, 3).await;
        Mock::given(method("GET"))
            .and(path("/v/3.ts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x47u8; 188])
                    .set_delay(Duration::from_secs(1)),
            )
            .mount(&server)
            .await;
        serve_segments(&server, 6).await;

        let settings = ProbeSettings {
            timeout: Duration::from_millis(200),
            ..fast_settings()
        };
        let prober = HttpProber::new(Client::new(), settings);
        let found = prober
            .probe(&template(&server), 200, &CancellationToken::new())
            .await;
        assert_eq!(found, 3);
    }

    #[tokio::test]
    async fn cancellation_mid_scan_keeps_count_so_far() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        serve_segments(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/v/2.ts"))
            .respond_with(CancelWhileServing(cancel.clone()))
            .expect(1)
            .mount(&server)
            .await;
        for i in 3..8 {
            Mock::given(method("GET"))
                .and(path(format!("/v/{i}.ts")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x47u8; 188]))
                .expect(0)
                .mount(&server)
                .await;
        }

        let prober = HttpProber::new(Client::new(), fast_settings());
        let found = prober.probe(&template(&server), 200, &cancel).await;

        assert_eq!(found, 3);
        assert!(cancel.is_cancelled());
    }
}
