//! Email address validation
//!
//! Accepts an RFC 5322 `addr-spec`: a dot-atom local part and a domain of
//! dot-separated labels. Quoted local parts and display names are rejected.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Local part 64, whole address 254 (RFC 5321 path limit minus brackets).
const MAX_LOCAL_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;

static ADDR_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*",
        r"@[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    ))
    .expect("invalid email regex")
});

/// Validated, trimmed email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }
        if s.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        let local_len = s.find('@').unwrap_or(s.len());
        if local_len > MAX_LOCAL_LEN || !ADDR_SPEC_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "invalid email",
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Optional email input: absent or blank means "not provided".
    pub fn optional(s: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match s.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Self::new(s).map(Some),
        }
    }

    /// Lowercased form used for login identity.
    pub fn to_lowercase(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses() {
        assert!(Email::new("dentist@clinic.com.br").is_ok());
        assert!(Email::new("first.last+tag@example.org").is_ok());
        assert!(Email::new("  padded@example.com  ").is_ok());
        assert!(Email::new("x@localhost").is_ok());
    }

    #[test]
    fn rejects_malformed() {
        for raw in [
            "plainaddress",
            "@example.com",
            "a@",
            "a..b@example.com",
            ".a@example.com",
            "a@-example.com",
            "a b@example.com",
            "Name <a@example.com>",
        ] {
            let err = Email::new(raw).unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidFormat { .. }),
                "expected invalid format for {raw:?}"
            );
        }
    }

    #[test]
    fn rejects_long_local_part() {
        let raw = format!("{}@example.com", "a".repeat(65));
        assert!(Email::new(&raw).is_err());
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(Email::optional(None).unwrap(), None);
        assert_eq!(Email::optional(Some("   ")).unwrap(), None);
        assert!(Email::optional(Some("nope")).is_err());
    }
}
