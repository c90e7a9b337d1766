use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    /// Body did not decode to a JSON object.
    #[error("{0}")]
    Malformed(String),

    /// A string leaf contained one of the denied characters.
    #[error("{0}")]
    Injection(String),

    /// Aggregated messages of every missing required field, space-joined.
    #[error("{0}")]
    MissingFields(String),

    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },
}

impl ParamError {
    pub fn invalid(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidField {
            field: field.into(),
            expected,
        }
    }
}
