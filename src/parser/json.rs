use serde_json::Value;

use crate::error::QbError;

pub fn parse(input: &str) -> Result<Value, QbError> {
    serde_json::from_str(input).map_err(|e| QbError::Parse(e.to_string()))
}
