//! Assistant command bridge: turns replies from a conversational backend into
//! validated flight-link actions and feeds vehicle state back to it.

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod geodesic;
mod handlers;
pub mod http_backend;
pub mod notice;
pub mod parser;
pub mod telemetry;

pub use backend::{
    fallback_models, AiBackend, AssistMode, BackendReply, BackendStatus, QueryRequest,
    FALLBACK_MODELS,
};
pub use command::{CommandDescriptor, CommandKind, ParamValue};
pub use config::{CopilotConfig, SettlePolicy};
pub use controller::{Controller, Phase, Turn};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{BackendError, CommandError, ParseError};
pub use http_backend::HttpBackend;
pub use notice::{Notice, Severity, Transcript};
pub use parser::parse_command;
pub use telemetry::{Snapshotter, TelemetrySnapshot};
