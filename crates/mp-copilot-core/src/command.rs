use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The fixed catalog of commands the assistant may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Arm,
    Disarm,
    Takeoff,
    Land,
    Rtl,
    Reboot,
    ChangeMode,
    Goto,
    AltitudeChange,
    GotoHome,
    MoveDirection,
    GetParam,
    SetParam,
}

impl CommandKind {
    pub const ALL: [CommandKind; 13] = [
        CommandKind::Arm,
        CommandKind::Disarm,
        CommandKind::Takeoff,
        CommandKind::Land,
        CommandKind::Rtl,
        CommandKind::Reboot,
        CommandKind::ChangeMode,
        CommandKind::Goto,
        CommandKind::AltitudeChange,
        CommandKind::GotoHome,
        CommandKind::MoveDirection,
        CommandKind::GetParam,
        CommandKind::SetParam,
    ];

    pub fn token(self) -> &'static str {
        match self {
            CommandKind::Arm => "ARM",
            CommandKind::Disarm => "DISARM",
            CommandKind::Takeoff => "TAKEOFF",
            CommandKind::Land => "LAND",
            CommandKind::Rtl => "RTL",
            CommandKind::Reboot => "REBOOT",
            CommandKind::ChangeMode => "CHANGE_MODE",
            CommandKind::Goto => "GOTO",
            CommandKind::AltitudeChange => "ALTITUDE_CHANGE",
            CommandKind::GotoHome => "GOTO_HOME",
            CommandKind::MoveDirection => "MOVE_DIRECTION",
            CommandKind::GetParam => "GET_PARAM",
            CommandKind::SetParam => "SET_PARAM",
        }
    }

    /// Case-insensitive catalog lookup.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.token().eq_ignore_ascii_case(token))
    }

    /// Required parameter names, in the order they are checked.
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            CommandKind::Takeoff => &["altitude"],
            CommandKind::ChangeMode => &["mode"],
            CommandKind::Goto => &["latitude", "longitude"],
            CommandKind::AltitudeChange => &["altitude_change"],
            CommandKind::MoveDirection => &["direction", "distance"],
            CommandKind::GetParam => &["name"],
            CommandKind::SetParam => &["name", "value"],
            CommandKind::Arm
            | CommandKind::Disarm
            | CommandKind::Land
            | CommandKind::Rtl
            | CommandKind::Reboot
            | CommandKind::GotoHome => &[],
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A loosely-typed parameter value as the assistant produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numbers and numeric strings; booleans never coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// One command requested by the assistant for the current turn.
///
/// `kind` is kept as received; the dispatcher resolves it against the
/// catalog so that unknown kinds can be reported by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl CommandDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_resolve_case_insensitively() {
        assert_eq!(CommandKind::from_token("goto_home"), Some(CommandKind::GotoHome));
        assert_eq!(CommandKind::from_token(" Takeoff "), Some(CommandKind::Takeoff));
        assert_eq!(CommandKind::from_token("FOO"), None);
        assert_eq!(CommandKind::from_token(""), None);
    }

    #[test]
    fn every_token_roundtrips() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_token(kind.token()), Some(kind));
        }
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(ParamValue::Number(12.5).as_f64(), Some(12.5));
        assert_eq!(ParamValue::from(" 30 ").as_f64(), Some(30.0));
        assert_eq!(ParamValue::from("high").as_f64(), None);
        assert_eq!(ParamValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let params: BTreeMap<String, ParamValue> =
            serde_json::from_str(r#"{"a": 1, "b": "x", "c": false}"#).unwrap();
        assert_eq!(params["a"], ParamValue::Number(1.0));
        assert_eq!(params["b"], ParamValue::Text("x".into()));
        assert_eq!(params["c"], ParamValue::Bool(false));
    }
}
