//! The identifier codec: one typed parsing function over a small closed
//! variant, shared by every identifier field in a rules document.

use crate::{format_id, MAX_CAN_ID};

/// An identifier value as it appears in an untrusted configuration
/// document: either an integer node or a text node. Anything else is
/// rejected up front with the offending type's name.
#[derive(Debug, Clone, PartialEq)]
pub enum IdValue<'a> {
    Int(i64),
    Text(&'a str),
}

impl<'a> IdValue<'a> {
    /// Bridge from a YAML node. Only integer and string nodes are
    /// identifier material; every other node type (float, bool, null,
    /// sequence, mapping) yields [`IdError::UnsupportedType`].
    pub fn from_yaml(value: &'a serde_yaml::Value, field: &str) -> Result<Self, IdError> {
        match value {
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(IdValue::Int(i)),
                None => Err(IdError::UnsupportedType {
                    field: field.to_string(),
                    type_name: "float",
                }),
            },
            serde_yaml::Value::String(s) => Ok(IdValue::Text(s)),
            other => Err(IdError::UnsupportedType {
                field: field.to_string(),
                type_name: yaml_type_name(other),
            }),
        }
    }
}

impl From<i64> for IdValue<'static> {
    fn from(v: i64) -> Self {
        IdValue::Int(v)
    }
}

impl From<u32> for IdValue<'static> {
    fn from(v: u32) -> Self {
        IdValue::Int(i64::from(v))
    }
}

impl<'a> From<&'a str> for IdValue<'a> {
    fn from(v: &'a str) -> Self {
        IdValue::Text(v)
    }
}

/// Identifier parsing failures. Every variant carries the field path so a
/// rules error points at the exact offending entry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdError {
    #[error("{field}: invalid CAN ID format '{value}'")]
    InvalidFormat { field: String, value: String },

    #[error("{field}: CAN ID must be an integer or hex/dec string, got {type_name}")]
    UnsupportedType {
        field: String,
        type_name: &'static str,
    },

    #[error("{field}: CAN ID {value} out of range [0, {}]", format_id(*.max))]
    OutOfRange { field: String, value: i128, max: u32 },
}

/// Parse and range-check a CAN identifier.
///
/// Integers are used as-is. Text is trimmed, lower-cased, and stripped of
/// underscore separators; a `0x` prefix selects base-16, otherwise base-10.
/// The range check `0 ..= MAX_CAN_ID` applies uniformly after parsing.
///
/// Pure: no state, no side effects. This is the single canonicalization
/// point — `parse_can_id` of `"0x123"`, `"0X1_23"`, and `291` all return
/// the same `u32`.
pub fn parse_can_id(value: &IdValue<'_>, field: &str) -> Result<u32, IdError> {
    let id = match value {
        IdValue::Int(i) => i128::from(*i),
        IdValue::Text(s) => {
            let cleaned: String = s.trim().to_ascii_lowercase().replace('_', "");
            let parsed = if let Some(hex) = cleaned.strip_prefix("0x") {
                // Unsigned parse: a sign after the prefix is malformed, not
                // merely out of range.
                u128::from_str_radix(hex, 16).map(|v| v as i128)
            } else {
                cleaned.parse::<i128>()
            };
            parsed.map_err(|_| IdError::InvalidFormat {
                field: field.to_string(),
                value: s.to_string(),
            })?
        }
    };

    if !(0..=i128::from(MAX_CAN_ID)).contains(&id) {
        return Err(IdError::OutOfRange {
            field: field.to_string(),
            value: id,
            max: MAX_CAN_ID,
        });
    }
    Ok(id as u32)
}

fn yaml_type_name(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged",
    }
}
