//! Filter compilation errors

use thiserror::Error;

/// Validation errors raised while compiling a filter.
///
/// All of these are detected before any SQL is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Malformed expression tree or dotted key
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A field the caller declared mandatory is absent
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Field is not on the allow-list of the query target
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

impl FilterError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FilterError::MissingRequiredField("meter").to_string(),
            "Missing required field: meter"
        );
        assert_eq!(
            FilterError::UnknownField("colour".into()).to_string(),
            "Unknown field: colour"
        );
        assert_eq!(
            FilterError::invalid("empty and").to_string(),
            "Invalid filter: empty and"
        );
    }
}
