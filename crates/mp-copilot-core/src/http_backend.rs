use crate::backend::{fallback_models, AiBackend, BackendReply, BackendStatus, QueryRequest};
use crate::config::CopilotConfig;
use crate::error::BackendError;
use crate::parser::parse_command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const NO_RESPONSE: &str = "[No response from AI]";
const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-over-HTTP client for the copilot backend service.
///
/// Endpoints: `GET /health`, `GET /status`, `POST /chat`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    model_catalog_url: Option<String>,
}

#[derive(Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct TagsBody {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    command: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpBackend {
    /// `timeout` bounds every request, including reading the body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_catalog_url: None,
        })
    }

    pub fn from_config(config: &CopilotConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(&config.backend_url, config.request_timeout)?
            .with_model_catalog(&config.model_catalog_url))
    }

    /// Where `available_models` looks up installed models (`GET {url}/api/tags`).
    pub fn with_model_catalog(mut self, url: &str) -> Self {
        self.model_catalog_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn list_models(&self, catalog_url: &str) -> Result<Vec<String>, reqwest::Error> {
        let body: TagsBody = self
            .client
            .get(format!("{catalog_url}/api/tags"))
            .timeout(MODEL_LIST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, request: &QueryRequest) -> Result<BackendReply, BackendError> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        if !response.status().is_success() {
            return Err(http_status_error(response.status()));
        }

        let body: ChatBody = response.json().await.map_err(classify)?;
        if !body.success {
            return Err(BackendError::Rejected(
                body.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let mut reply = BackendReply::text(body.response.unwrap_or_else(|| NO_RESPONSE.to_string()));
        match parse_command(body.command.as_ref()) {
            Ok(command) => reply.command = command,
            Err(err) => {
                warn!("discarding malformed command from backend: {err}");
                reply.ignored_command = Some(err.to_string());
            }
        }
        Ok(reply)
    }
}

fn http_status_error(status: reqwest::StatusCode) -> BackendError {
    BackendError::Rejected(format!("Backend error: HTTP {}", status.as_u16()))
}

fn classify(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_decode() {
        debug!("undecodable backend response: {err}");
        BackendError::Rejected("Invalid response from AI backend".to_string())
    } else {
        debug!("backend request failed: {err}");
        BackendError::Unavailable
    }
}

#[async_trait]
impl AiBackend for HttpBackend {
    async fn health_check(&self) -> bool {
        let response = match self.client.get(self.url("/health")).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "health check failed");
                return false;
            }
            Err(err) => {
                debug!("health check failed: {err}");
                return false;
            }
        };
        match response.json::<HealthBody>().await {
            Ok(body) => body.status == "healthy",
            Err(_) => false,
        }
    }

    async fn status(&self) -> Result<BackendStatus, BackendError> {
        let response = self
            .client
            .get(self.url("/status"))
            .send()
            .await
            .map_err(classify)?;
        if !response.status().is_success() {
            return Err(http_status_error(response.status()));
        }
        response.json().await.map_err(classify)
    }

    async fn available_models(&self) -> Vec<String> {
        let Some(catalog_url) = &self.model_catalog_url else {
            return fallback_models();
        };
        match self.list_models(catalog_url).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                debug!("model catalog is empty; offering defaults");
                fallback_models()
            }
            Err(err) => {
                debug!("model catalog unavailable: {err}");
                fallback_models()
            }
        }
    }

    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<BackendReply, BackendError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            result = self.chat(&request) => result,
        }
    }
}
