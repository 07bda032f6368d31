use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use forge_contracts::{FailureKind, ForgeError};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_REQUEST_TIMEOUT_S: u64 = 90;
pub const DEFAULT_TRANSPORT_RETRIES: usize = 2;
const RETRY_BACKOFF_S: f64 = 1.2;
const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// `?key=` query parameter (Google endpoints).
    QueryKey(&'a str),
    Bearer(&'a str),
}

/// Blocking JSON-over-HTTP with a per-request timeout and bounded retries
/// for connect/timeout failures.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    timeout: Duration,
    max_retries: usize,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT_S, DEFAULT_TRANSPORT_RETRIES)
    }
}

impl HttpTransport {
    pub fn new(timeout_s: u64, max_retries: usize) -> Self {
        Self {
            http: HttpClient::new(),
            timeout: Duration::from_secs(timeout_s),
            max_retries,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn post_json(
        &self,
        provider: &str,
        endpoint: &str,
        auth: Auth<'_>,
        payload: &Value,
    ) -> Result<Value> {
        let response = self.post_with_transport_retries(provider, endpoint, auth, payload)?;
        response_json_or_error(provider, response)
    }

    fn post_with_transport_retries(
        &self,
        provider: &str,
        endpoint: &str,
        auth: Auth<'_>,
        payload: &Value,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            let builder = self.http.post(endpoint).timeout(self.timeout).json(payload);
            let builder = match auth {
                Auth::QueryKey(key) => builder.query(&[("key", key)]),
                Auth::Bearer(key) => builder.bearer_auth(key),
            };
            match builder.send() {
                Ok(response) => return Ok(response),
                Err(raw) => {
                    let err = anyhow::Error::new(raw)
                        .context(format!("{provider} request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(
                        provider,
                        attempt,
                        max_retries = self.max_retries,
                        "transport retry after transient request failure"
                    );
                    thread::sleep(Duration::from_secs_f64(RETRY_BACKOFF_S * attempt as f64));
                }
            }
        }
    }
}

/// Non-2xx becomes `UpstreamTransport` with a truncated body; a body that
/// is not JSON becomes `UpstreamMalformed`.
pub fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(ForgeError::transport(
            provider,
            format!(
                "request failed ({code}): {}",
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            ),
        )
        .into());
    }
    serde_json::from_str(&body).map_err(|err| {
        anyhow::Error::new(err).context(ForgeError::malformed(
            provider,
            "returned invalid JSON payload",
        ))
    })
}

pub fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| reqwest_err.is_timeout() || reqwest_err.is_connect())
            .unwrap_or(false)
    })
}

/// Maps an error chain onto the stage failure taxonomy.
///
/// A tagged `ForgeError` anywhere in the chain wins; bare reqwest errors are
/// transport, bare decode errors are malformed output.
pub fn classify_failure(err: &anyhow::Error) -> FailureKind {
    if let Some(tagged) = err.downcast_ref::<ForgeError>() {
        return FailureKind::from(tagged);
    }
    if err.downcast_ref::<serde_json::Error>().is_some()
        || err.downcast_ref::<base64::DecodeError>().is_some()
    {
        FailureKind::UpstreamMalformed
    } else {
        FailureKind::UpstreamTransport
    }
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use serde_json::json;

    use super::*;

    /// Serves exactly one canned HTTP response on a loopback port.
    fn serve_once(status_line: &'static str, body: &'static str) -> anyhow::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let reply = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        Ok(format!("http://{addr}/v1/test"))
    }

    #[test]
    fn post_json_returns_parsed_body() -> anyhow::Result<()> {
        let endpoint = serve_once("HTTP/1.1 200 OK", r#"{"ok":true}"#)?;
        let transport = HttpTransport::new(5, 0);
        let value = transport.post_json("Fake", &endpoint, Auth::Bearer("k"), &json!({}))?;
        assert_eq!(value, json!({"ok": true}));
        Ok(())
    }

    #[test]
    fn non_success_status_is_upstream_transport() -> anyhow::Result<()> {
        let endpoint = serve_once("HTTP/1.1 503 Service Unavailable", "busy")?;
        let transport = HttpTransport::new(5, 0);
        let err = match transport.post_json("Fake", &endpoint, Auth::QueryKey("k"), &json!({})) {
            Ok(value) => anyhow::bail!("expected failure, got {value}"),
            Err(err) => err,
        };
        assert_eq!(classify_failure(&err), FailureKind::UpstreamTransport);
        assert!(error_chain_text(&err, 200).contains("503"));
        Ok(())
    }

    #[test]
    fn invalid_json_body_is_upstream_malformed() -> anyhow::Result<()> {
        let endpoint = serve_once("HTTP/1.1 200 OK", "<html>nope</html>")?;
        let transport = HttpTransport::new(5, 0);
        let err = match transport.post_json("Fake", &endpoint, Auth::Bearer("k"), &json!({})) {
            Ok(value) => anyhow::bail!("expected failure, got {value}"),
            Err(err) => err,
        };
        assert_eq!(classify_failure(&err), FailureKind::UpstreamMalformed);
        Ok(())
    }

    #[test]
    fn refused_connection_is_retryable_transport() -> anyhow::Result<()> {
        let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
        let transport = HttpTransport::new(5, 0);
        let err = match transport.post_json(
            "Fake",
            &format!("http://{addr}/closed"),
            Auth::Bearer("k"),
            &json!({}),
        ) {
            Ok(value) => anyhow::bail!("expected failure, got {value}"),
            Err(err) => err,
        };
        assert!(is_retryable_transport_error(&err));
        assert_eq!(classify_failure(&err), FailureKind::UpstreamTransport);
        Ok(())
    }

    #[test]
    fn error_chain_text_dedupes_and_truncates() {
        let err = anyhow::anyhow!("root cause")
            .context("root cause")
            .context("outer");
        assert_eq!(error_chain_text(&err, 200), "outer | caused by: root cause");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
