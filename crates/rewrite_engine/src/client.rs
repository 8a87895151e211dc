use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use rewrite_core::ChatMessage;
use rewrite_logging::{rewrite_debug, rewrite_info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ndjson::decode_ndjson;
use crate::{ChatChunk, ChatRequest, FailureKind, ModelError};

pub type ChunkStream = BoxStream<'static, Result<ChatChunk, ModelError>>;

/// Address of the model server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 11434;

    /// Validates settings-UI input. Blank values fall back to the defaults.
    pub fn parse(host: &str, port: &str) -> Result<Self, ModelError> {
        let port = match port.trim() {
            "" => Self::DEFAULT_PORT,
            raw => raw.parse::<u16>().map_err(|err| {
                ModelError::new(FailureKind::InvalidEndpoint, format!("port {raw:?}: {err}"))
            })?,
        };
        Self::from_parts(host, port)
    }

    pub fn from_parts(host: &str, port: u16) -> Result<Self, ModelError> {
        let host = match host.trim() {
            "" => Self::DEFAULT_HOST,
            raw => raw,
        };
        if host.contains("://") || host.contains('/') {
            return Err(ModelError::new(
                FailureKind::InvalidEndpoint,
                format!("host {host:?} must be a bare host name"),
            ));
        }
        let endpoint = Self {
            host: host.to_string(),
            port,
        };
        endpoint.join("")?;
        Ok(endpoint)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Absolute URL of `path` on this server.
    pub fn join(&self, path: &str) -> Result<Url, ModelError> {
        Url::parse(&format!("{self}{path}"))
            .map_err(|err| ModelError::new(FailureKind::InvalidEndpoint, err.to_string()))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}/", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Chat and model-listing calls against a language-model server.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Starts a streaming chat completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ModelError>;

    async fn list_models(&self) -> Result<Vec<String>, ModelError>;

    /// Cheap reachability probe.
    async fn check_connection(&self) -> Result<(), ModelError> {
        self.list_models().await.map(|_| ())
    }

    /// Points later calls at a different server. Calls already in flight
    /// keep their old endpoint.
    fn reconfigure(&self, endpoint: Endpoint);
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct WireTags {
    #[serde(default)]
    models: Vec<WireTag>,
}

#[derive(Deserialize)]
struct WireTag {
    name: String,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
}

/// [`ModelClient`] for an Ollama server.
#[derive(Debug)]
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: RwLock<Endpoint>,
}

impl OllamaClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ModelError> {
        // No overall timeout: a generation may legitimately run for minutes.
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ModelError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            http,
            endpoint: RwLock::new(settings.endpoint),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ModelError> {
        let url = self.endpoint().join("api/chat")?;
        rewrite_debug!(
            "POST {} model={} messages={}",
            url,
            request.model,
            request.messages.len()
        );
        let body = WireChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;

        let bytes = response
            .bytes_stream()
            .map(|item| item.map_err(map_reqwest_error));
        Ok(decode_ndjson(bytes))
    }

    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = self.endpoint().join("api/tags")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        let tags: WireTags = response
            .json()
            .await
            .map_err(|err| ModelError::new(FailureKind::Malformed, err.to_string()))?;
        Ok(tags.models.into_iter().map(|tag| tag.name).collect())
    }

    fn reconfigure(&self, endpoint: Endpoint) {
        rewrite_info!("model server endpoint set to {}", endpoint);
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = endpoint;
    }
}

/// Maps a non-2xx response to an error, preferring the server's own
/// `{"error": ...}` message over the bare status line.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<WireError>(&body)
        .map(|wire| wire.error)
        .unwrap_or_else(|_| status.to_string());
    Err(ModelError::new(
        FailureKind::HttpStatus(status.as_u16()),
        message,
    ))
}

fn map_reqwest_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        return ModelError::new(FailureKind::Timeout, err.to_string());
    }
    ModelError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::Endpoint;
    use crate::FailureKind;

    #[test]
    fn blank_parts_fall_back_to_defaults() {
        let endpoint = Endpoint::parse(" ", "").unwrap();
        assert_eq!(endpoint, Endpoint::default());
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 11434);
    }

    #[test]
    fn custom_host_and_port_build_base_url() {
        let endpoint = Endpoint::parse("gpu-box.local", "11500").unwrap();
        assert_eq!(endpoint.to_string(), "http://gpu-box.local:11500/");
        assert_eq!(
            endpoint.join("api/chat").unwrap().as_str(),
            "http://gpu-box.local:11500/api/chat"
        );
    }

    #[test]
    fn bad_port_or_schemed_host_is_rejected() {
        let err = Endpoint::parse("localhost", "eleven").unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidEndpoint);
        let err = Endpoint::parse("http://localhost", "11434").unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidEndpoint);
    }
}
