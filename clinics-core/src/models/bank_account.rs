//! Bank account input

use serde::{Deserialize, Serialize};

use super::ValidationError;

const MAX_BANK_FIELD_LEN: usize = 32;

/// Bank account as submitted by a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankAccountInput {
    pub bank_code: String,
    pub branch_number: String,
    pub account_number: String,
}

impl BankAccountInput {
    pub fn new(bank_code: &str, branch_number: &str, account_number: &str) -> Self {
        Self {
            bank_code: bank_code.to_owned(),
            branch_number: branch_number.to_owned(),
            account_number: account_number.to_owned(),
        }
    }
}

/// Validated bank account ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBankAccount {
    pub bank_code: String,
    pub branch_number: String,
    pub account_number: String,
}

impl NewBankAccount {
    pub fn new(input: &BankAccountInput) -> Result<Self, ValidationError> {
        Ok(Self {
            bank_code: required("bank_code", &input.bank_code)?,
            branch_number: required("branch_number", &input.branch_number)?,
            account_number: required("account_number", &input.account_number)?,
        })
    }

    /// Validate a list, reporting the index of the first bad entry.
    pub fn list(inputs: &[BankAccountInput]) -> crate::Result<Vec<Self>> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| Self::new(input).map_err(|e| e.at("bank_accounts", i)))
            .collect()
    }
}

fn required(field: &'static str, s: &str) -> Result<String, ValidationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if s.len() > MAX_BANK_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_BANK_FIELD_LEN,
        });
    }
    Ok(s.to_owned())
}
