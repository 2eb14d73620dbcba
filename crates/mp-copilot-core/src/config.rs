use crate::backend::AssistMode;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_MODEL: &str = "qwen2.5:3b";
/// Local Ollama daemon listing installed models under `/api/tags`.
pub const DEFAULT_MODEL_CATALOG_URL: &str = "http://localhost:11434";

/// How long a mode-dependent command waits for the vehicle to report the
/// mode it just requested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettlePolicy {
    #[serde(rename = "ack_timeout_ms", deserialize_with = "millis")]
    pub ack_timeout: Duration,
    /// Used instead when the link cannot observe mode changes.
    #[serde(rename = "fallback_delay_ms", deserialize_with = "millis")]
    pub fallback_delay: Duration,
}

impl SettlePolicy {
    /// No waiting at all; mainly for tests.
    pub fn immediate() -> Self {
        Self {
            ack_timeout: Duration::ZERO,
            fallback_delay: Duration::ZERO,
        }
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(2),
            fallback_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub backend_url: String,
    pub model_catalog_url: String,
    #[serde(rename = "request_timeout_ms", deserialize_with = "millis")]
    pub request_timeout: Duration,
    pub model: String,
    pub mode: AssistMode,
    pub settle: SettlePolicy,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model_catalog_url: DEFAULT_MODEL_CATALOG_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            model: DEFAULT_MODEL.to_string(),
            mode: AssistMode::Ask,
            settle: SettlePolicy::default(),
        }
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
