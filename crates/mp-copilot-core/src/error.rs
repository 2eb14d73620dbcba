use crate::command::CommandKind;
use mavkit::LinkError;

/// Why a dispatched command did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Not connected to drone")]
    NotConnected,
    #[error("Invalid command")]
    InvalidCommand,
    #[error("{0} requires {1} parameter")]
    MissingParameter(CommandKind, &'static str),
    #[error("{0} parameter '{1}' must be {2}")]
    InvalidParameter(CommandKind, &'static str, &'static str),
    #[error("Unknown command type: {0}")]
    UnknownCommandKind(String),
    #[error("Unsupported direction '{0}' (use north, south, east or west)")]
    UnsupportedDirection(String),
    #[error("Current position unknown (no GPS fix?)")]
    UnknownPosition,
    #[error("Cannot descend below ground level")]
    NegativeAltitude,
    #[error("Home position not set")]
    HomeNotSet,
    #[error("Parameter {0} not found")]
    ParameterNotFound(String),
    #[error("Vehicle refused {0}")]
    PrimitiveRejected(CommandKind),
    /// The link faulted mid-command. Only the fault category is displayed.
    #[error("{} failed: {}", .0, .1.category())]
    PrimitiveFault(CommandKind, #[source] LinkError),
}

/// Failure of an AI round trip.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("AI Backend not available. Please ensure the backend server is running.")]
    Unavailable,
    #[error("Request timed out. The AI backend may be processing a complex query.")]
    Timeout,
    #[error("{0}")]
    Rejected(String),
    #[error("Request cancelled by user")]
    Cancelled,
}

/// Malformed command token in an AI reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("command is not an object")]
    NotAnObject,
    #[error("command has no string 'type'")]
    MissingType,
    #[error("command 'params' is not an object")]
    ParamsNotObject,
    #[error("command parameter '{0}' is not a number, string or boolean")]
    InvalidValue(String),
}
