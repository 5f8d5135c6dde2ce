use serde_json::Value;

use crate::error::QbError;
use crate::format::Format;

/// Format a Value as a string in the given format.
pub fn format_value(
    value: &Value,
    format: Format,
    compact: bool,
    raw: bool,
) -> Result<String, QbError> {
    // Raw mode: if the value is a string, output it without quotes
    if raw {
        if let Value::String(s) = value {
            return Ok(s.clone());
        }
    }

    match format {
        Format::Json => format_json(value, compact),
        Format::Yaml => {
            serde_yaml::to_string(value).map_err(|e| QbError::Serialize(e.to_string()))
        }
        Format::Toml => format_toml(value),
    }
}

fn format_json(value: &Value, compact: bool) -> Result<String, QbError> {
    let result = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    result.map_err(|e| QbError::Serialize(e.to_string()))
}

// TOML documents must be tables; scalars (levels, ids) fall back to JSON.
fn format_toml(value: &Value) -> Result<String, QbError> {
    if !value.is_object() {
        return format_json(value, true);
    }
    toml::to_string_pretty(value).map_err(|e| QbError::Serialize(e.to_string()))
}
