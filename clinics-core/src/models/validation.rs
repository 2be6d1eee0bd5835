//! Validation error types

use std::fmt;

/// Validation error for input models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., tax id, email)
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// Numeric value outside the accepted range
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be an integer between {} and {}", field, min, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Prefix the field name with its position in a list input.
    pub fn at(self, list: &str, index: usize) -> crate::Error {
        crate::Error::validation(format!("{}[{}]: {}", list, index, self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "legal_name",
            max: 255,
        };
        assert_eq!(
            err.to_string(),
            "legal_name exceeds maximum length of 255 characters"
        );

        let err = ValidationError::OutOfRange {
            field: "limit",
            min: 1,
            max: 100,
        };
        assert_eq!(err.to_string(), "limit must be an integer between 1 and 100");
    }

    #[test]
    fn indexed_list_error() {
        let err = ValidationError::Empty { field: "bank_code" }.at("bank_accounts", 2);
        assert_eq!(err.detail(), "bank_accounts[2]: bank_code cannot be empty");
    }
}
