//! Shared fixtures for registry integration tests
#![allow(dead_code)]

use clinics_core::models::{AttachDentist, BankAccountInput, CreateClinic};

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

fn mod11(digits: &str, weights: &[u32]) -> u32 {
    let sum: u32 = digits
        .chars()
        .zip(weights)
        .map(|(c, w)| c.to_digit(10).unwrap() * w)
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

/// Valid numeric CNPJ for branch 0001 of company `seq`.
pub fn cnpj(seq: u32) -> String {
    let base = format!("{:08}0001", seq);
    let first = format!("{}{}", base, mod11(&base, &CNPJ_FIRST_WEIGHTS));
    format!("{}{}", first, mod11(&first, &CNPJ_SECOND_WEIGHTS))
}

/// Valid CPF built from a 9-digit base.
pub fn cpf(seq: u32) -> String {
    let base = format!("{:09}", 100_000_000 + seq % 800_000_000);
    let weights: Vec<u32> = (2..=10).rev().collect();
    let first = format!("{}{}", base, mod11(&base, &weights));
    let weights: Vec<u32> = (2..=11).rev().collect();
    format!("{}{}", first, mod11(&first, &weights))
}

pub fn bank_account(code: &str) -> BankAccountInput {
    BankAccountInput::new(code, "1234", "998877")
}

pub fn create_clinic(tax_id: &str, legal_name: &str) -> CreateClinic {
    CreateClinic {
        tax_id_number: tax_id.to_owned(),
        legal_name: legal_name.to_owned(),
        bank_accounts: vec![bank_account("001")],
        ..Default::default()
    }
}

pub fn attach(tax_id: &str, is_admin: Option<bool>, is_legal_representative: Option<bool>) -> AttachDentist {
    AttachDentist {
        tax_id_number: tax_id.to_owned(),
        legal_name: "Ana Souza".to_owned(),
        is_admin,
        is_legal_representative,
        ..Default::default()
    }
}
