//! # Target Fetcher
//!
//! Reads the active scrape targets of one collector pod from its
//! Prometheus-compatible `/api/v1/targets` endpoint.

use crate::constants::TARGETS_API_PATH;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Health of a target as reported by the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    Up,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TargetHealth {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetHealth::Up => "up",
            TargetHealth::Down => "down",
            TargetHealth::Unknown => "unknown",
        }
    }
}

/// One active target as reported by a collector
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub scrape_pool: String,
    #[serde(default)]
    pub health: TargetHealth,
    /// Empty when the last scrape succeeded
    #[serde(default)]
    pub last_error: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Seconds
    #[serde(default)]
    pub last_scrape_duration: f64,
}

/// Address of the targets API on one collector pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorEndpoint {
    pub pod_name: String,
    pub pod_ip: Option<String>,
    pub port: u16,
}

impl CollectorEndpoint {
    /// `http://<ip>:<port>/api/v1/targets?state=active`, `None` without a pod IP
    #[must_use]
    pub fn targets_url(&self) -> Option<String> {
        let ip = self.pod_ip.as_deref().filter(|ip| !ip.is_empty())?;
        let host = if ip.contains(':') {
            format!("[{ip}]")
        } else {
            ip.to_string()
        };
        Some(format!(
            "http://{host}:{}{TARGETS_API_PATH}?state=active",
            self.port
        ))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("pod {pod} has no IP address")]
    MissingPodIp { pod: String },

    #[error("request to pod {pod} failed: {source}")]
    Http {
        pod: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("pod {pod} answered with HTTP {status}")]
    Status { pod: String, status: u16 },

    #[error("decoding targets of pod {pod} failed: {source}")]
    Decode {
        pod: String,
        #[source]
        source: reqwest::Error,
    },

    /// The payload decoded but reported `status != "success"`
    #[error("targets API of pod {pod} returned {status:?}: {message}")]
    Api {
        pod: String,
        status: String,
        message: String,
    },

    #[error("fetching targets of pod {pod} timed out after {timeout:?}")]
    Timeout { pod: String, timeout: Duration },

    #[error("fetching targets of pod {pod} was cancelled")]
    Cancelled { pod: String },
}

/// Reads the active targets of one collector
#[async_trait]
pub trait TargetFetcher: Send + Sync {
    async fn fetch(
        &self,
        endpoint: &CollectorEndpoint,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetRecord>, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetsResponse {
    status: String,
    #[serde(default)]
    data: Option<TargetsData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetsData {
    #[serde(default)]
    active_targets: Vec<TargetRecord>,
}

impl TargetsResponse {
    fn into_targets(self, pod: &str) -> Result<Vec<TargetRecord>, FetchError> {
        if self.status != "success" {
            let message = match (self.error_type, self.error) {
                (Some(kind), Some(error)) => format!("{kind}: {error}"),
                (None, Some(error)) => error,
                (Some(kind), None) => kind,
                (None, None) => "no error reported".to_string(),
            };
            return Err(FetchError::Api {
                pod: pod.to_string(),
                status: self.status,
                message,
            });
        }
        Ok(self.data.unwrap_or_default().active_targets)
    }
}

/// [`TargetFetcher`] issuing plain HTTP GETs with a per-request deadline
#[derive(Debug, Clone)]
pub struct HttpTargetFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTargetFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn request(&self, pod: &str, url: &str) -> Result<Vec<TargetRecord>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                pod: pod.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                pod: pod.to_string(),
                status: status.as_u16(),
            });
        }

        let body: TargetsResponse = response.json().await.map_err(|source| FetchError::Decode {
            pod: pod.to_string(),
            source,
        })?;
        body.into_targets(pod)
    }
}

#[async_trait]
impl TargetFetcher for HttpTargetFetcher {
    async fn fetch(
        &self,
        endpoint: &CollectorEndpoint,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetRecord>, FetchError> {
        let pod = endpoint.pod_name.as_str();
        let url = endpoint
            .targets_url()
            .ok_or_else(|| FetchError::MissingPodIp {
                pod: pod.to_string(),
            })?;
        debug!(pod = %pod, url = %url, "fetching collector targets");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled { pod: pod.to_string() }),
            result = tokio::time::timeout(self.timeout, self.request(pod, &url)) => match result {
                Ok(targets) => targets,
                Err(_elapsed) => Err(FetchError::Timeout {
                    pod: pod.to_string(),
                    timeout: self.timeout,
                }),
            },
        }
    }
}
