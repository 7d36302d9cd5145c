//! Connection testing against configured source endpoints.
//!
//! Receive endpoints are called for real and must answer 2xx. Update
//! endpoints are only checked for reachability: OPTIONS, then HEAD, then the
//! configured method with an empty JSON object, stopping at the first request
//! that gets any response at all. Each probe is bounded by one deadline.

use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use api_integrator::Source;

/// Deadline for one probe, retries included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Which side of a source is being probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Receive,
    Update,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Receive => f.write_str("receive"),
            EndpointKind::Update => f.write_str("update"),
        }
    }
}

/// A successful probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    pub status: u16,
    pub status_text: String,
    /// Parsed JSON body, or the raw text when it is not JSON. `Null` for
    /// update probes.
    pub data: Value,
}

/// Why a probe failed.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("Missing {0} endpoint URL")]
    MissingEndpoint(EndpointKind),

    #[error("Timeout")]
    Timeout,

    #[error("HTTP {status} {status_text}: {body}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("{endpoint} request failed: {message}")]
    Network {
        endpoint: EndpointKind,
        message: String,
    },
}

impl ProbeError {
    /// Short explanation suitable for a results table.
    pub fn user_message(&self) -> String {
        match self {
            ProbeError::MissingEndpoint(kind) => format!("Missing {kind} endpoint URL."),
            ProbeError::Timeout => format!("Request timed out ({}s).", PROBE_TIMEOUT.as_secs()),
            ProbeError::Status {
                status,
                status_text,
                ..
            } => format!("HTTP {status} {status_text}"),
            ProbeError::Network {
                endpoint: EndpointKind::Receive,
                ..
            } => "Network or parsing error.".to_string(),
            ProbeError::Network {
                endpoint: EndpointKind::Update,
                ..
            } => "Network error or endpoint not reachable.".to_string(),
        }
    }
}

/// Kind of row in a connection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Receive,
    Update,
    Notice,
}

/// Outcome of one row in a connection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
    Info,
}

/// One line of a `test_all` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub endpoint: Option<String>,
    pub status: ReportStatus,
    pub message: String,
    pub data: Option<Value>,
}

/// HTTP client for connection tests.
#[derive(Clone)]
pub struct ConnectionProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ConnectionProber {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionProber {
    pub fn new() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("api-integrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }

    /// Call the receive endpoint the way a generated integration would.
    ///
    /// POST receives carry the source's receive payload as a JSON body.
    pub async fn test_receive(&self, source: &Source) -> Result<ProbeResponse, ProbeError> {
        let url = source
            .receive_url()
            .ok_or(ProbeError::MissingEndpoint(EndpointKind::Receive))?;
        let method = parse_method(source.receive_method.as_str());

        let mut request = self.client.request(method, url);
        for (name, value) in source.receive_header_pairs() {
            request = request.header(name, value);
        }
        if let Some(body) = source.receive_body() {
            request = request.json(&body);
        }

        let probe = async {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => return Err(network(EndpointKind::Receive, e)),
            };
            let status = response.status();
            let status_text = status.canonical_reason().unwrap_or_default().to_string();
            let text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                return Err(ProbeError::Status {
                    status: status.as_u16(),
                    status_text,
                    body: if text.is_empty() {
                        "Non-OK response".to_string()
                    } else {
                        text
                    },
                });
            }

            let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
            Ok(ProbeResponse {
                status: status.as_u16(),
                status_text,
                data,
            })
        };

        let result = self.bounded(probe).await;
        tracing::debug!("Receive probe for {}: {:?}", source.name, result.as_ref().map(|r| r.status));
        result
    }

    /// Check that the update endpoint answers at all, without sending data.
    ///
    /// Any HTTP status counts as reachable.
    pub async fn test_update(&self, source: &Source) -> Result<ProbeResponse, ProbeError> {
        let url = source
            .update_url()
            .ok_or(ProbeError::MissingEndpoint(EndpointKind::Update))?;
        let configured = parse_method(source.update_method.as_str());
        let headers = source.update_header_pairs();

        let probe = async {
            let mut last_error = None;
            for method in [Method::OPTIONS, Method::HEAD, configured] {
                let with_body = method != Method::GET && method != Method::HEAD && method != Method::OPTIONS;
                let mut request = self.client.request(method.clone(), url);
                for (name, value) in &headers {
                    request = request.header(name.as_str(), value.as_str());
                }
                if with_body {
                    request = request.json(&json!({}));
                }

                match request.send().await {
                    Ok(response) => {
                        let status = response.status();
                        return Ok(ProbeResponse {
                            status: status.as_u16(),
                            status_text: status.canonical_reason().unwrap_or_default().to_string(),
                            data: Value::Null,
                        });
                    }
                    Err(e) => {
                        tracing::debug!("{method} probe of {url} failed: {e}");
                        last_error = Some(e);
                    }
                }
            }
            Err(ProbeError::Network {
                endpoint: EndpointKind::Update,
                message: last_error.map(|e| e.to_string()).unwrap_or_default(),
            })
        };

        self.bounded(probe).await
    }

    /// Probe every configured endpoint of every source, one at a time.
    pub async fn test_all(&self, sources: &[Source]) -> Vec<ConnectionReport> {
        let mut reports = Vec::new();
        for source in sources {
            if let Some(url) = source.receive_url() {
                let report = match self.test_receive(source).await {
                    Ok(resp) => ConnectionReport {
                        source: source.name.clone(),
                        kind: ReportKind::Receive,
                        endpoint: Some(url.to_string()),
                        status: ReportStatus::Success,
                        message: format!("Connected ({} {})", resp.status, resp.status_text),
                        data: Some(resp.data),
                    },
                    Err(e) => failure(source, ReportKind::Receive, url, &e),
                };
                reports.push(report);
            }

            if let Some(url) = source.update_url() {
                let report = match self.test_update(source).await {
                    Ok(resp) => ConnectionReport {
                        source: source.name.clone(),
                        kind: ReportKind::Update,
                        endpoint: Some(url.to_string()),
                        status: ReportStatus::Success,
                        message: format!("Reachable ({} {})", resp.status, resp.status_text),
                        data: None,
                    },
                    Err(e) => failure(source, ReportKind::Update, url, &e),
                };
                reports.push(report);
            }

            if source.is_inert() {
                reports.push(ConnectionReport {
                    source: source.name.clone(),
                    kind: ReportKind::Notice,
                    endpoint: None,
                    status: ReportStatus::Info,
                    message: "No endpoints configured".to_string(),
                    data: None,
                });
            }
        }
        reports
    }

    async fn bounded<F>(&self, probe: F) -> Result<ProbeResponse, ProbeError>
    where
        F: std::future::Future<Output = Result<ProbeResponse, ProbeError>>,
    {
        match tokio::time::timeout(self.timeout, probe).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

fn parse_method(name: &str) -> Method {
    Method::from_bytes(name.as_bytes()).unwrap_or(Method::GET)
}

fn network(endpoint: EndpointKind, e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        return ProbeError::Timeout;
    }
    ProbeError::Network {
        endpoint,
        message: e.to_string(),
    }
}

fn failure(source: &Source, kind: ReportKind, url: &str, e: &ProbeError) -> ConnectionReport {
    tracing::warn!("Connection test failed for {} ({url}): {e}", source.name);
    ConnectionReport {
        source: source.name.clone(),
        kind,
        endpoint: Some(url.to_string()),
        status: ReportStatus::Error,
        message: e.user_message(),
        data: None,
    }
}
