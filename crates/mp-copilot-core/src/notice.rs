use crate::dispatch::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    User,
    Thinking,
    Assistant,
    Success,
    Warning,
    Error,
    System,
}

/// One rendered transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
}

impl Notice {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    pub fn user(message: &str) -> Self {
        Self::new(format!("You: {message}"), Severity::User)
    }

    /// Provisional line shown while a query is in flight.
    pub fn thinking() -> Self {
        Self::new("Assistant: Thinking...", Severity::Thinking)
    }

    pub fn assistant(reply: &str) -> Self {
        Self::new(format!("Assistant: {reply}"), Severity::Assistant)
    }

    pub fn assistant_error(detail: impl fmt::Display) -> Self {
        Self::new(format!("Assistant: [Error: {detail}]"), Severity::Error)
    }

    pub fn cancelled() -> Self {
        Self::new("Assistant: [Request cancelled by user]", Severity::Warning)
    }

    pub fn warning(detail: impl fmt::Display) -> Self {
        Self::new(format!("[Warning: {detail}]"), Severity::Warning)
    }

    pub fn system(detail: impl fmt::Display) -> Self {
        Self::new(format!("[System: {detail}]"), Severity::System)
    }

    /// `✓ message` on success, `[Error: reason]` on failure.
    pub fn outcome(outcome: &Outcome) -> Self {
        match outcome {
            Ok(message) => Self::new(format!("✓ {message}"), Severity::Success),
            Err(err) => Self::new(format!("[Error: {err}]"), Severity::Error),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Host-owned chat surface the controller writes to.
pub trait Transcript: Send + Sync {
    fn append(&self, text: &str, severity: Severity);
    /// Remove the most recently appended line.
    fn remove_last(&self);
    fn scroll_to_end(&self);
    fn clear_input(&self);

    fn post(&self, notice: &Notice) {
        self.append(&notice.text, notice.severity);
        self.scroll_to_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::error::CommandError;

    #[test]
    fn outcome_markers() {
        let ok = Notice::outcome(&Ok("Armed".to_string()));
        assert_eq!(ok.text, "✓ Armed");
        assert_eq!(ok.severity, Severity::Success);

        let err = Notice::outcome(&Err(CommandError::PrimitiveRejected(CommandKind::Arm)));
        assert_eq!(err.text, "[Error: Vehicle refused ARM]");
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn chat_prefixes() {
        assert_eq!(Notice::user("take off").text, "You: take off");
        assert_eq!(
            Notice::assistant_error("Request timed out").text,
            "Assistant: [Error: Request timed out]"
        );
        assert_eq!(
            Notice::system("AI Backend connected ✓").text,
            "[System: AI Backend connected ✓]"
        );
    }
}
