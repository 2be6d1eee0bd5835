//! Use-case inputs and outputs
//!
//! Inputs are plain data as received from the transport layer; the
//! registry validates them. Outputs are what use cases hand back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BankAccountInput;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClinic {
    pub tax_id_number: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bank_accounts: Vec<BankAccountInput>,
}

/// Partial clinic update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClinic {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bank_accounts: Option<Vec<BankAccountInput>>,
    pub bank_account_ids_to_remove: Option<Vec<String>>,
}

impl UpdateClinic {
    pub(crate) fn touches_person(&self) -> bool {
        self.legal_name.is_some()
            || self.trade_name.is_some()
            || self.email.is_some()
            || self.phone.is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.touches_person()
            && self.bank_accounts.is_none()
            && self.bank_account_ids_to_remove.is_none()
    }
}

/// Dentist identity plus the roles to hold at the clinic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachDentist {
    pub tax_id_number: String,
    pub legal_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_admin: Option<bool>,
    pub is_legal_representative: Option<bool>,
}

impl AttachDentist {
    pub fn roles(&self) -> RolePatch {
        RolePatch {
            is_admin: self.is_admin,
            is_legal_representative: self.is_legal_representative,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDentist {
    pub legal_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Role flags to change; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RolePatch {
    pub is_admin: Option<bool>,
    pub is_legal_representative: Option<bool>,
}

impl RolePatch {
    pub fn is_empty(&self) -> bool {
        self.is_admin.is_none() && self.is_legal_representative.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankAccountView {
    pub id: Uuid,
    pub bank_code: String,
    pub branch_number: String,
    pub account_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicSummary {
    pub id: Uuid,
    pub person_id: Uuid,
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,
    pub tax_id_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Dentists with an active affiliation, ascending by id.
    pub dentist_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicDetails {
    #[serde(flatten)]
    pub clinic: ClinicSummary,
    pub bank_accounts: Vec<BankAccountView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DentistSummary {
    pub id: Uuid,
    pub person_id: Uuid,
    pub legal_name: String,
    pub tax_id_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A dentist as seen through one active affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicDentist {
    #[serde(flatten)]
    pub dentist: DentistSummary,
    pub is_admin: bool,
    pub is_legal_representative: bool,
    pub started_at: DateTime<Utc>,
}
