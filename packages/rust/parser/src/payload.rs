//! Raw FDD extraction from request payloads.

use std::path::Path;

use serde_json::Value;

use fsdgen_shared::{FsdGenError, Result};

/// Request payload key holding the FDD text.
pub const FDD_KEY: &str = "FDD";

/// The full source document as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument(String);

impl RawDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Extract the `FDD` field from a JSON request payload.
    ///
    /// An absent or `null` field is an empty document, not an error.
    pub fn from_request_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| FsdGenError::parse(format!("invalid request payload: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(FsdGenError::parse("request payload must be a JSON object"));
        };

        match fields.get(FDD_KEY) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(text)) => Ok(Self(text.clone())),
            Some(other) => Err(FsdGenError::parse(format!(
                "`{FDD_KEY}` must be a string, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Read a document from disk: `.json` files are request payloads,
    /// anything else is taken as FDD text verbatim.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FsdGenError::io(path, e))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_request_json(&content)
        } else {
            Ok(Self(content))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
