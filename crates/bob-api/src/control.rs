// Control-plane HTTP client
//
// Thin wrapper over `reqwest::Client` for the backend's `/api/*` surface.
// Only the status code matters for start/stop; the body is parsed when
// present but never required.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::{Endpoints, TransportConfig};

/// Pipeline state reported by `GET /api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Running,
    Stopped,
    Error,
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: PipelineState,
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub detections_per_second: Option<f64>,
}

/// Body of `POST /api/start` and `POST /api/stop`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Detector tuning pushed with `POST /api/config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorConfig {
    pub confidence: f64,
    pub nms: f64,
    /// Video source selector (`camera`, a file path, ...).
    pub source: String,
}

/// HTTP client for the backend control plane.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    /// Request timeout baked into `http`, when known.
    timeout: Option<Duration>,
}

impl ControlClient {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoints: Endpoints::new(base_url)?,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            endpoints: Endpoints::new(base_url.parse()?)?,
            timeout: None,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// `true` when `GET /api/status` answers with a success status.
    ///
    /// Never fails: any transport error counts as unhealthy.
    pub async fn check_health(&self) -> bool {
        let url = match self.endpoints.api("status") {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build status URL");
                return false;
            }
        };

        match self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(resp) => {
                let ok = resp.status().is_success();
                debug!(status = resp.status().as_u16(), ok, "health probe answered");
                ok
            }
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Fetch the typed pipeline status.
    pub async fn status(&self) -> Result<StatusResponse, Error> {
        let url = self.endpoints.api("status")?;
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        parse_json(resp).await
    }

    /// Ask the backend to start detection.
    pub async fn start(&self) -> Result<CommandResponse, Error> {
        self.post_command("start").await
    }

    /// Ask the backend to stop detection.
    pub async fn stop(&self) -> Result<CommandResponse, Error> {
        self.post_command("stop").await
    }

    /// Push detector tuning. Best-effort: failures are logged and swallowed.
    pub async fn update_config(&self, config: &DetectorConfig) {
        if let Err(e) = self.try_update_config(config).await {
            warn!(error = %e, "config update not available");
        }
    }

    async fn try_update_config(&self, config: &DetectorConfig) -> Result<(), Error> {
        let url = self.endpoints.api("config")?;
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(config)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check_status(&resp)
    }

    async fn post_command(&self, command: &str) -> Result<CommandResponse, Error> {
        let url = self.endpoints.api(command)?;
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check_status(&resp)?;

        // The body is informational only.
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(CommandResponse {
                success: true,
                message: None,
            });
        }
        Ok(serde_json::from_str(&body).unwrap_or(CommandResponse {
            success: true,
            message: None,
        }))
    }

    fn request_error(&self, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(timeout) if err.is_timeout() => Error::Timeout {
                timeout_secs: timeout.as_secs(),
            },
            _ => Error::Transport(err),
        }
    }
}

// ── Response helpers ─────────────────────────────────────────────────

fn check_status(resp: &reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Http {
            status: status.as_u16(),
        })
    }
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    check_status(&resp)?;
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
