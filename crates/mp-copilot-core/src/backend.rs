use crate::command::CommandDescriptor;
use crate::error::BackendError;
use crate::telemetry::TelemetrySnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Offered when no model catalog can be reached.
pub const FALLBACK_MODELS: [&str; 3] = ["qwen2.5:3b", "qwen2.5:7b", "qwen2.5:14b"];

pub fn fallback_models() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
}

/// Whether the assistant may act on the vehicle or only answer questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistMode {
    Agent,
    #[default]
    Ask,
}

impl AssistMode {
    pub fn token(self) -> &'static str {
        match self {
            AssistMode::Agent => "agent",
            AssistMode::Ask => "ask",
        }
    }
}

impl fmt::Display for AssistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub message: String,
    pub mode: AssistMode,
    pub model: String,
    pub telemetry: TelemetrySnapshot,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub command: Option<CommandDescriptor>,
    /// Why a command present in the reply was discarded, if one was.
    pub ignored_command: Option<String>,
}

impl BackendReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_command(mut self, command: CommandDescriptor) -> Self {
        self.command = Some(command);
        self
    }
}

/// Model and backend names reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendStatus {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub backend: String,
}

/// Conversational AI service answering operator questions.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn health_check(&self) -> bool;

    async fn status(&self) -> Result<BackendStatus, BackendError> {
        Err(BackendError::Unavailable)
    }

    /// Models the operator can pick from. Never empty.
    async fn available_models(&self) -> Vec<String> {
        fallback_models()
    }

    /// One round trip. Must return `BackendError::Cancelled` promptly once
    /// `cancel` fires.
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<BackendReply, BackendError>;
}
