use serde_json::Value;

use crate::error::QbError;

pub fn parse(input: &str) -> Result<Value, QbError> {
    let toml_val: toml::Value =
        toml::from_str(input).map_err(|e| QbError::Parse(e.to_string()))?;
    Ok(toml_to_json(toml_val))
}

// Datetimes have no JSON counterpart; they become their TOML text.
fn toml_to_json(val: toml::Value) -> Value {
    match val {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => {
            serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
        }
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
