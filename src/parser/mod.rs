pub mod json;
pub mod toml;
pub mod yaml;

use serde_json::Value;

use crate::error::QbError;
use crate::format::Format;

/// Parse input text into a serde_json::Value based on format.
///
/// Blank input parses to `null`, which callers treat as "no query yet".
pub fn parse(input: &str, format: Format) -> Result<Value, QbError> {
    if input.trim().is_empty() {
        return Ok(Value::Null);
    }
    match format {
        Format::Yaml => yaml::parse(input),
        Format::Json => json::parse(input),
        Format::Toml => toml::parse(input),
    }
}
