use crate::command::{CommandDescriptor, ParamValue};
use crate::error::ParseError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Turn the `command` field of an assistant reply into a descriptor.
///
/// Absent or `null` means the assistant requested nothing and yields
/// `Ok(None)`. Anything present but malformed is an error; callers must
/// never execute a command from it.
pub fn parse_command(token: Option<&Value>) -> Result<Option<CommandDescriptor>, ParseError> {
    let object = match token {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(ParseError::NotAnObject),
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingType)?;

    let params = match object.get("params") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(params)) => params
            .iter()
            .map(|(name, value)| Ok((name.clone(), param_value(name, value)?)))
            .collect::<Result<_, ParseError>>()?,
        Some(_) => return Err(ParseError::ParamsNotObject),
    };

    Ok(Some(CommandDescriptor {
        kind: kind.to_string(),
        params,
    }))
}

fn param_value(name: &str, value: &Value) -> Result<ParamValue, ParseError> {
    match value {
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => n
            .as_f64()
            .map(ParamValue::Number)
            .ok_or_else(|| ParseError::InvalidValue(name.to_string())),
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(ParseError::InvalidValue(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_null_mean_no_command() {
        assert_eq!(parse_command(None), Ok(None));
        assert_eq!(parse_command(Some(&Value::Null)), Ok(None));
    }

    #[test]
    fn parses_type_and_params() {
        let token = json!({"type": "takeoff", "params": {"altitude": 20}});
        let cmd = parse_command(Some(&token)).unwrap().unwrap();
        assert_eq!(cmd.kind, "takeoff");
        assert_eq!(cmd.param("altitude"), Some(&ParamValue::Number(20.0)));
    }

    #[test]
    fn missing_params_is_empty_map() {
        let token = json!({"type": "ARM"});
        let cmd = parse_command(Some(&token)).unwrap().unwrap();
        assert!(cmd.params.is_empty());
    }

    #[test]
    fn numeric_strings_are_kept_for_coercion() {
        let token = json!({"type": "GOTO", "params": {"latitude": "47.39", "longitude": 8.54}});
        let cmd = parse_command(Some(&token)).unwrap().unwrap();
        assert_eq!(cmd.param("latitude").and_then(ParamValue::as_f64), Some(47.39));
    }

    #[test]
    fn malformed_shapes_are_errors() {
        assert_eq!(
            parse_command(Some(&json!("ARM"))),
            Err(ParseError::NotAnObject)
        );
        assert_eq!(
            parse_command(Some(&json!({"params": {}}))),
            Err(ParseError::MissingType)
        );
        assert_eq!(
            parse_command(Some(&json!({"type": 7}))),
            Err(ParseError::MissingType)
        );
        assert_eq!(
            parse_command(Some(&json!({"type": "ARM", "params": [1, 2]}))),
            Err(ParseError::ParamsNotObject)
        );
        assert_eq!(
            parse_command(Some(&json!({"type": "GOTO", "params": {"latitude": [1]}}))),
            Err(ParseError::InvalidValue("latitude".into()))
        );
        assert_eq!(
            parse_command(Some(&json!({"type": "GOTO", "params": {"latitude": null}}))),
            Err(ParseError::InvalidValue("latitude".into()))
        );
    }
}
