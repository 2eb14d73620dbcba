#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("vehicle disconnected")]
    Disconnected,
    #[error("operation timed out")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("command {command} rejected: {result}")]
    CommandRejected { command: String, result: String },
    #[error("command id {0} is not a known MAV_CMD")]
    UnknownCommandId(u16),
    #[error("no heartbeat received yet")]
    IdentityUnknown,
    #[error("mode '{0}' not available for this vehicle")]
    ModeNotAvailable(String),
    #[error("parameter name '{0}' must be 1 to 16 ASCII bytes")]
    InvalidParamName(String),
    #[error("MAVLink I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Fixed, operator-safe description of the failure class. Never contains
    /// text that originated on the wire or in the OS.
    pub fn category(&self) -> &'static str {
        match self {
            LinkError::ConnectionFailed(_) | LinkError::Disconnected => "link unavailable",
            LinkError::Timeout => "no response from vehicle",
            LinkError::Cancelled => "cancelled",
            LinkError::CommandRejected { .. } => "rejected by autopilot",
            LinkError::UnknownCommandId(_) => "unsupported command",
            LinkError::IdentityUnknown => "vehicle not identified",
            LinkError::ModeNotAvailable(_) => "mode not available",
            LinkError::InvalidParamName(_) => "invalid parameter name",
            LinkError::Io(_) => "link I/O error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_hides_io_detail() {
        let err = LinkError::Io(std::io::Error::other("socket 0xdeadbeef reset"));
        assert_eq!(err.category(), "link I/O error");
        assert!(!err.category().contains("deadbeef"));
    }

    #[test]
    fn rejected_display_names_command() {
        let err = LinkError::CommandRejected {
            command: "MAV_CMD_NAV_TAKEOFF".into(),
            result: "MAV_RESULT_DENIED".into(),
        };
        assert_eq!(
            err.to_string(),
            "command MAV_CMD_NAV_TAKEOFF rejected: MAV_RESULT_DENIED"
        );
    }
}
