//! Free-text person fields

use super::ValidationError;

/// Maximum length for legal and trade names
const MAX_NAME_LEN: usize = 255;

/// Maximum length for phone numbers as typed by the user
const MAX_PHONE_LEN: usize = 32;

/// Validated legal name (trimmed, non-empty)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalName(String);

impl LegalName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "legal_name" });
        }
        if s.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "legal_name",
                max: MAX_NAME_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trim an optional field; blank means "not provided".
pub fn optional_text(
    field: &'static str,
    s: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(s) => Ok(Some(s.to_owned())),
    }
}

pub fn trade_name(s: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text("trade_name", s, MAX_NAME_LEN)
}

pub fn phone(s: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text("phone", s, MAX_PHONE_LEN)
}
