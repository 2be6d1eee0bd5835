//! Record to output mapping

use uuid::Uuid;

use crate::models::{BankAccountView, ClinicDentist, ClinicSummary, DentistSummary};
use crate::store::{BankAccount, ClinicDentistRow, ClinicRow, Dentist, Person};

impl ClinicSummary {
    pub(crate) fn from_row(row: ClinicRow, dentist_ids: Vec<Uuid>) -> Self {
        let ClinicRow { clinic, person } = row;
        Self {
            id: clinic.id,
            person_id: person.id,
            legal_name: person.legal_name,
            trade_name: person.trade_name,
            tax_id_number: person.tax_id_number,
            email: person.email,
            phone: person.phone,
            dentist_ids,
        }
    }
}

impl DentistSummary {
    pub(crate) fn from_parts(dentist: &Dentist, person: Person) -> Self {
        Self {
            id: dentist.id,
            person_id: person.id,
            legal_name: person.legal_name,
            tax_id_number: person.tax_id_number,
            email: person.email,
            phone: person.phone,
        }
    }
}

impl From<ClinicDentistRow> for ClinicDentist {
    fn from(row: ClinicDentistRow) -> Self {
        Self {
            dentist: DentistSummary::from_parts(&row.dentist, row.person),
            is_admin: row.affiliation.is_admin,
            is_legal_representative: row.affiliation.is_legal_representative,
            started_at: row.affiliation.started_at,
        }
    }
}

impl From<BankAccount> for BankAccountView {
    fn from(account: BankAccount) -> Self {
        Self {
            id: account.id,
            bank_code: account.bank_code,
            branch_number: account.branch_number,
            account_number: account.account_number,
        }
    }
}

/// Group `(clinic_id, dentist_id)` pairs under their clinic, keeping order.
pub(crate) fn dentist_ids_for(pairs: &[(Uuid, Uuid)], clinic_id: Uuid) -> Vec<Uuid> {
    pairs
        .iter()
        .filter(|(c, _)| *c == clinic_id)
        .map(|(_, d)| *d)
        .collect()
}
