//! Blocking HTTP client for the dashboard backend plus the shared fetch error taxonomy.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::observability::{env_override, non_blank, positive_millis};
use crate::schedule::MintSchedule;
use crate::search::{MessagePageResponse, SearchStats};

pub const CONNECTIVITY_MESSAGE: &str = "Unable to connect. Please try again later";
pub const NO_DATA_MESSAGE: &str = "No data found";

pub const SEARCH_MESSAGES_PATH: &str = "/searchMessages/";
pub const SEARCH_STATS_PATH: &str = "/search/";
pub const TODAYS_MINTS_PATH: &str = "/getTodaysMints";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

pub fn backend_config_from_env() -> BackendConfig {
    let defaults = BackendConfig::default();
    BackendConfig {
        base_url: env_override("MINTBOARD_BACKEND_URL", non_blank).unwrap_or(defaults.base_url),
        timeout_ms: env_override("MINTBOARD_HTTP_TIMEOUT_MS", positive_millis)
            .unwrap_or(defaults.timeout_ms),
    }
}

/// Failure of a single backend call, classified the way the pages surface it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    /// No response arrived at all.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    /// The server answered with a non-success status.
    #[error("server error {status} for {url}: {message}")]
    Server {
        url: String,
        status: u16,
        message: String,
    },
    /// A success status whose body could not be decoded.
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    /// Text shown to the user on the page (banner or toast).
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Server { message, .. } => message.clone(),
            FetchError::Malformed { .. } => NO_DATA_MESSAGE.to_string(),
            FetchError::Transport { .. } | FetchError::HttpClientBuild(_) => {
                CONNECTIVITY_MESSAGE.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMessagesRequest {
    pub word: String,
    pub page_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatsRequest {
    pub word: String,
}

/// The three backend calls the pages depend on.
pub trait Backend: Send + Sync + 'static {
    fn search_messages(
        &self,
        request: &SearchMessagesRequest,
    ) -> Result<MessagePageResponse, FetchError>;

    fn search_stats(&self, request: &SearchStatsRequest) -> Result<SearchStats, FetchError>;

    fn todays_mints(&self) -> Result<MintSchedule, FetchError>;
}

#[derive(Debug, Deserialize)]
struct TodaysMintsEnvelope {
    data: MintSchedule,
}

pub struct ReqwestBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ReqwestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| FetchError::HttpClientBuild(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let payload = serde_json::to_vec(body).map_err(|err| FetchError::Transport {
            url: url.clone(),
            message: format!("failed to encode request body: {err}"),
        })?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .map_err(|err| FetchError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;

        read_json(&url, response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| FetchError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;

        read_json(&url, response)
    }
}

impl Backend for ReqwestBackend {
    fn search_messages(
        &self,
        request: &SearchMessagesRequest,
    ) -> Result<MessagePageResponse, FetchError> {
        self.post_json(SEARCH_MESSAGES_PATH, request)
    }

    fn search_stats(&self, request: &SearchStatsRequest) -> Result<SearchStats, FetchError> {
        self.post_json(SEARCH_STATS_PATH, request)
    }

    fn todays_mints(&self) -> Result<MintSchedule, FetchError> {
        let envelope: TodaysMintsEnvelope = self.get_json(TODAYS_MINTS_PATH)?;
        Ok(envelope.data)
    }
}

fn read_json<T: DeserializeOwned>(
    url: &str,
    response: reqwest::blocking::Response,
) -> Result<T, FetchError> {
    let status = response.status();
    let bytes = response.bytes().map_err(|err| FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    })?;

    if !status.is_success() {
        let message = extract_error_message(status.as_u16(), &bytes);
        warn!(
            component = "backend",
            event = "backend.response.error_status",
            url,
            status = status.as_u16(),
            message = %message
        );
        return Err(FetchError::Server {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    debug!(
        component = "backend",
        event = "backend.response.ok",
        url,
        bytes = bytes.len()
    );

    serde_json::from_slice(&bytes).map_err(|err| FetchError::Malformed {
        url: url.to_string(),
        message: err.to_string(),
    })
}

/// Pulls the human readable `body` field out of an error response.
pub fn extract_error_message(status: u16, payload: &[u8]) -> String {
    serde_json::from_slice::<Value>(payload)
        .ok()
        .and_then(|value| match value.get("body") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| format!("unexpected HTTP status {status}"))
}
