//! Brazilian tax ids: CPF (individuals) and CNPJ (companies)
//!
//! CNPJ accepts the alphanumeric layout: twelve `[0-9A-Z]` base characters
//! followed by two numeric check digits. Each character weighs its ASCII
//! code minus 48, so digits keep their face value.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("invalid regex"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z]").expect("invalid regex"));

static CNPJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Z]{12}[0-9]{2}$").expect("invalid cnpj regex"));

static CPF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{11}$").expect("invalid cpf regex"));

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Kind of person behind a tax id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonKind {
    Individual,
    Company,
}

impl PersonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Company => "COMPANY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INDIVIDUAL" => Some(Self::Individual),
            "COMPANY" => Some(Self::Company),
            _ => None,
        }
    }

    /// The only tax id type a person of this kind may carry.
    pub fn tax_id_type(&self) -> TaxIdType {
        match self {
            Self::Individual => TaxIdType::Cpf,
            Self::Company => TaxIdType::Cnpj,
        }
    }
}

impl fmt::Display for PersonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaxIdType {
    Cpf,
    Cnpj,
}

impl TaxIdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpf => "CPF",
            Self::Cnpj => "CNPJ",
        }
    }
}

/// A normalized tax id whose check digits have been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxId {
    kind: PersonKind,
    number: String,
}

impl TaxId {
    /// Normalize and validate `raw` for a person of `kind`.
    ///
    /// # Example
    /// ```
    /// use clinics_core::models::{PersonKind, TaxId};
    ///
    /// let cnpj = TaxId::parse(PersonKind::Company, "04.252.011/0001-10").unwrap();
    /// assert_eq!(cnpj.as_str(), "04252011000110");
    /// assert!(TaxId::parse(PersonKind::Individual, "111.111.111-11").is_err());
    /// ```
    pub fn parse(kind: PersonKind, raw: &str) -> Result<Self, ValidationError> {
        let (number, valid) = match kind {
            PersonKind::Company => {
                let number = normalize_cnpj(raw);
                let valid = is_valid_cnpj(&number);
                (number, valid)
            }
            PersonKind::Individual => {
                let number = normalize_cpf(raw);
                let valid = is_valid_cpf(&number);
                (number, valid)
            }
        };

        if number.is_empty() {
            return Err(ValidationError::Empty {
                field: "tax_id_number",
            });
        }
        if !valid {
            return Err(ValidationError::InvalidFormat {
                field: "tax_id_number",
                reason: match kind {
                    PersonKind::Company => "invalid CNPJ",
                    PersonKind::Individual => "invalid CPF",
                },
            });
        }

        Ok(Self { kind, number })
    }

    pub fn kind(&self) -> PersonKind {
        self.kind
    }

    pub fn id_type(&self) -> TaxIdType {
        self.kind.tax_id_type()
    }

    pub fn as_str(&self) -> &str {
        &self.number
    }
}

/// Strip everything but digits.
pub fn normalize_cpf(raw: &str) -> String {
    NON_DIGITS.replace_all(raw, "").into_owned()
}

/// Strip everything but letters and digits, uppercasing letters.
pub fn normalize_cnpj(raw: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(raw.trim(), "")
        .to_ascii_uppercase()
}

/// Check digits of an already-normalized CPF.
pub fn is_valid_cpf(cpf: &str) -> bool {
    if !CPF_RE.is_match(cpf) || all_same(cpf) {
        return false;
    }

    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        match (sum * 10) % 11 {
            10 => 0,
            r => r,
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// Check digits of an already-normalized CNPJ (numeric or alphanumeric).
pub fn is_valid_cnpj(cnpj: &str) -> bool {
    if !CNPJ_RE.is_match(cnpj) || all_same(cnpj) {
        return false;
    }

    let values: Vec<u32> = cnpj.bytes().map(|b| u32::from(b) - 48).collect();
    let check = |weights: &[u32]| -> u32 {
        let sum: u32 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
        match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        }
    };

    check(&CNPJ_FIRST_WEIGHTS) == values[12] && check(&CNPJ_SECOND_WEIGHTS) == values[13]
}

fn all_same(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(first) => bytes.all(|b| b == first),
        None => true,
    }
}
