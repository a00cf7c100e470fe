//! Typed access to the conventional keys of a hook event's input map.

use hookgate_protocol::HookEvent;
use serde_json::Value;

use crate::error::GateError;

pub const FILE_PATH: &str = "file_path";
pub const COMMAND: &str = "command";
pub const CONTENT: &str = "content";
pub const DESCRIPTION: &str = "description";
pub const PATTERN: &str = "pattern";
pub const NEW_STRING: &str = "new_string";
pub const OLD_STRING: &str = "old_string";

/// Keys holding file bodies rather than instructions.
pub const BODY_FIELDS: &[&str] = &[CONTENT, NEW_STRING, OLD_STRING];

/// Reads a string field. Absent, `null`, and blank values are treated as
/// missing; any other non-string value is a malformed event.
pub fn str_field<'a>(event: &'a HookEvent, key: &str) -> Result<Option<&'a str>, GateError> {
    match event.input(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(GateError::MalformedField {
            field: key.to_string(),
            found: value_kind(other),
        }),
    }
}

/// First present value among `keys`, in order.
pub fn first_str_field<'a>(
    event: &'a HookEvent,
    keys: &[&str],
) -> Result<Option<&'a str>, GateError> {
    for key in keys {
        if let Some(value) = str_field(event, key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Text that will land in a file: Write `content` or Edit `new_string`.
/// `MultiEdit` bodies arrive as an `edits` array and are joined.
pub fn written_text(event: &HookEvent) -> Result<Option<String>, GateError> {
    if let Some(content) = first_str_field(event, &[CONTENT, NEW_STRING])? {
        return Ok(Some(content.to_string()));
    }

    let Some(Value::Array(edits)) = event.input("edits") else {
        return Ok(None);
    };
    let joined: Vec<&str> = edits
        .iter()
        .filter_map(|edit| edit.get(NEW_STRING).and_then(Value::as_str))
        .collect();
    if joined.is_empty() {
        Ok(None)
    } else {
        Ok(Some(joined.join("\n")))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn blank_and_null_fields_are_missing() {
        let event = HookEvent::pre_tool_use("Write")
            .with_input(FILE_PATH, "  ")
            .with_input(COMMAND, Value::Null);

        assert_eq!(str_field(&event, FILE_PATH).unwrap(), None);
        assert_eq!(str_field(&event, COMMAND).unwrap(), None);
        assert_eq!(str_field(&event, PATTERN).unwrap(), None);
    }

    #[test]
    fn non_string_field_is_malformed() {
        let event = HookEvent::pre_tool_use("Edit").with_input(FILE_PATH, 42);
        let err = str_field(&event, FILE_PATH).unwrap_err();
        assert!(matches!(
            err,
            GateError::MalformedField { ref field, found: "number" } if field == FILE_PATH
        ));
    }

    #[test]
    fn multi_edit_bodies_are_joined() {
        let event = HookEvent::pre_tool_use("MultiEdit").with_input(
            "edits",
            json!([
                {"old_string": "a", "new_string": "first"},
                {"old_string": "b", "new_string": "second"}
            ]),
        );
        assert_eq!(
            written_text(&event).unwrap().as_deref(),
            Some("first\nsecond")
        );
    }
}
