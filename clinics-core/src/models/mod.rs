//! Input models with validation at construction
//!
//! All caller input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod bank_account;
pub mod email;
pub mod io;
pub mod tax_id;
pub mod text;
pub mod validation;

pub use bank_account::{BankAccountInput, NewBankAccount};
pub use email::Email;
pub use io::{
    AttachDentist, BankAccountView, ClinicDentist, ClinicDetails, ClinicSummary, CreateClinic,
    DentistSummary, RolePatch, UpdateClinic, UpdateDentist,
};
pub use tax_id::{PersonKind, TaxId, TaxIdType};
pub use text::LegalName;
pub use validation::ValidationError;
