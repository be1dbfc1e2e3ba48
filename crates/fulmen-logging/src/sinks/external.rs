use std::time::Duration;

use reqwest::blocking::Client;

use super::serialize;
use crate::event::LogEvent;
use super::Sink;

/// Best-effort HTTP POST of each event as a JSON body, via `reqwest`'s
/// blocking client (this pipeline is synchronous end to end, so the
/// async client would only add an unused runtime). No retries, no
/// redirect following beyond `reqwest`'s default, no response body
/// parsing — any failure is swallowed per the sink contract (spec's
/// open question (a) on external-sink retry semantics: best-effort,
/// single-attempt delivery).
pub struct ExternalSink {
    url: String,
    client: Client,
}

impl ExternalSink {
    /// `url` is the full POST target, e.g. `"https://logs.internal/ingest"`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("reqwest blocking client must build with default TLS backend");
        ExternalSink { url: url.into(), client }
    }
}

impl Sink for ExternalSink {
    fn write(&self, event: &LogEvent) {
        let body = serialize(event);
        let result = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send();
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), url = %self.url, "external log sink rejected event");
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "external log sink POST failed; event dropped");
            }
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    #[test]
    fn unreachable_host_does_not_panic() {
        let sink = ExternalSink::new("http://127.0.0.1:1/ingest");
        sink.write(&LogEvent::new("svc", Severity::Info, "hi"));
    }
}
