use chrono::{DateTime, Local};
use serde_json::Value;
use timemgt_types::ObjectId;
use timemgt_types::id::OBJECT_ID_HEX_LEN;
use tracing::debug;

use crate::error::ParamError;
use crate::value::{Param, Params};

/// Characters that could smuggle operators into a structured query.
pub const DENIED_CHARS: &[char] = &['$', '[', ']', '{', '}', '(', ')'];

const INJECTION_MESSAGE: &str = "must not contain special characters such as $[]{}()";

/// Sanitizer policy. Immutable once built; share it freely across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamsPolicy {
    /// Walk nested objects and arrays. When off, only top-level leaves are
    /// sanitized and nested containers pass through as-is.
    pub deep: bool,
    /// Turn 24-hex strings into [`ObjectId`]s.
    pub convert_object_id: bool,
    /// Turn RFC 3339 strings into local timestamps.
    pub convert_time: bool,
    /// Reject strings containing any of [`DENIED_CHARS`].
    pub deny_injection: bool,
}

impl Default for ParamsPolicy {
    fn default() -> Self {
        Self {
            deep: true,
            convert_object_id: true,
            convert_time: true,
            deny_injection: true,
        }
    }
}

impl ParamsPolicy {
    pub const fn with_deep(self, deep: bool) -> Self {
        Self { deep, ..self }
    }

    pub const fn with_convert_object_id(self, convert_object_id: bool) -> Self {
        Self {
            convert_object_id,
            ..self
        }
    }

    pub const fn with_convert_time(self, convert_time: bool) -> Self {
        Self {
            convert_time,
            ..self
        }
    }

    pub const fn with_deny_injection(self, deny_injection: bool) -> Self {
        Self {
            deny_injection,
            ..self
        }
    }

    /// Decode a raw body and sanitize it. The body must be a JSON object.
    pub fn sanitize(&self, body: &[u8]) -> Result<Params, ParamError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            debug!("rejecting undecodable body: {}", e);
            ParamError::Malformed(format!("malformed JSON body: {}", e))
        })?;
        self.sanitize_value(value)
    }

    /// Sanitize an already decoded tree. The top level must be an object.
    pub fn sanitize_value(&self, value: Value) -> Result<Params, ParamError> {
        match value {
            Value::Object(map) => {
                let mut out = std::collections::BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, self.convert(v)?);
                }
                Ok(Params::new(out))
            }
            other => Err(ParamError::Malformed(format!(
                "request body must be a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Sanitize a single node.
    pub fn convert(&self, value: Value) -> Result<Param, ParamError> {
        match value {
            Value::String(s) => self.convert_str(s),
            Value::Object(map) if self.deep => {
                let mut out = std::collections::BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, self.convert(v)?);
                }
                Ok(Param::Object(out))
            }
            Value::Array(items) if self.deep => items
                .into_iter()
                .map(|item| self.convert(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Param::Array),
            other => Ok(Param::from_json(other)),
        }
    }

    /// Injection check first, then identifier, then timestamp, else text.
    pub fn convert_str(&self, s: String) -> Result<Param, ParamError> {
        if self.deny_injection && s.contains(DENIED_CHARS) {
            return Err(ParamError::Injection(INJECTION_MESSAGE.to_string()));
        }

        if self.convert_object_id && s.len() == OBJECT_ID_HEX_LEN {
            if let Ok(id) = ObjectId::parse_str(&s) {
                return Ok(Param::ObjectId(id));
            }
        }

        if self.convert_time && has_rfc3339_shape(&s) {
            if let Ok(t) = DateTime::parse_from_rfc3339(&s) {
                return Ok(Param::Time(t.with_timezone(&Local)));
            }
        }

        Ok(Param::String(s))
    }
}

/// chrono also takes a space or a lowercase `t`/`z`; only the strict form
/// (`T` separator, `Z` or `+hh:mm` offset) counts as a timestamp.
fn has_rfc3339_shape(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 20 || b[10] != b'T' {
        return false;
    }
    match b[b.len() - 1] {
        b'Z' => true,
        _ => {
            let off = &b[b.len() - 6..];
            matches!(off[0], b'+' | b'-') && off[3] == b':'
        }
    }
}

/// Sanitize with an explicit policy.
pub fn sanitize(policy: &ParamsPolicy, body: &[u8]) -> Result<Params, ParamError> {
    policy.sanitize(body)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
