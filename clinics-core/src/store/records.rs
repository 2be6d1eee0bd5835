//! Persisted records
//!
//! Soft deletion is explicit: every deletable record carries a
//! [`RecordStatus`] and the store only hands back active rows unless a
//! method says otherwise.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{PersonKind, TaxIdType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Active,
    Deleted(DateTime<Utc>),
}

impl RecordStatus {
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(at) => Self::Deleted(at),
            None => Self::Active,
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active => None,
            Self::Deleted(at) => Some(*at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: Uuid,
    pub kind: PersonKind,
    pub tax_id_number: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RecordStatus,
}

impl Person {
    pub fn tax_id_type(&self) -> TaxIdType {
        self.kind.tax_id_type()
    }
}

/// In-place person update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PersonPatch {
    pub(crate) fn apply(&self, person: &mut Person, at: DateTime<Utc>) {
        if let Some(v) = &self.legal_name {
            person.legal_name = v.clone();
        }
        if let Some(v) = &self.trade_name {
            person.trade_name = Some(v.clone());
        }
        if let Some(v) = &self.email {
            person.email = Some(v.clone());
        }
        if let Some(v) = &self.phone {
            person.phone = Some(v.clone());
        }
        person.updated_at = at;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clinic {
    pub id: Uuid,
    pub person_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dentist {
    pub id: Uuid,
    pub person_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub bank_code: String,
    pub branch_number: String,
    pub account_number: String,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
}

/// Clinic/dentist link. Active while `ended_at` is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliation {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub dentist_id: Uuid,
    pub is_admin: bool,
    pub is_legal_representative: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Affiliation {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Stored lowercased.
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Clinic joined with its person
#[derive(Debug, Clone)]
pub struct ClinicRow {
    pub clinic: Clinic,
    pub person: Person,
}

/// Dentist joined with its person
#[derive(Debug, Clone)]
pub struct DentistRow {
    pub dentist: Dentist,
    pub person: Person,
}

/// Dentist joined with its person and its active link to one clinic
#[derive(Debug, Clone)]
pub struct ClinicDentistRow {
    pub dentist: Dentist,
    pub person: Person,
    pub affiliation: Affiliation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_deleted_at() {
        assert!(RecordStatus::from_deleted_at(None).is_active());

        let at = Utc::now();
        let status = RecordStatus::from_deleted_at(Some(at));
        assert!(!status.is_active());
        assert_eq!(status.deleted_at(), Some(at));
    }
}
