use serde_json::Value;

use crate::error::QbError;

/// Parse YAML straight into a serde_json::Value so queries and catalogs are
/// handled as one value type whatever file they came from.
pub fn parse(input: &str) -> Result<Value, QbError> {
    serde_yaml::from_str(input).map_err(|e| QbError::Parse(e.to_string()))
}
