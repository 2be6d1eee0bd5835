//! Store gateway - transactional access to the relational store
//!
//! # Design Principles
//!
//! - Uniqueness is enforced by partial unique indexes, not check-then-insert
//! - Inserts that take part in a find-or-create race report
//!   [`StoreError::UniqueViolation`] and leave the transaction usable
//! - Only active (non-deleted, non-ended) rows are returned unless a method
//!   says otherwise
//! - Dropping a [`Transaction`] without committing rolls it back

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::RolePatch;

pub use memory::{MemoryStore, RaceSite};
pub use pool::create_pool;
pub use postgres::PgStore;
pub use records::{
    Affiliation, BankAccount, Clinic, ClinicDentistRow, ClinicRow, Dentist, DentistRow, Person,
    PersonPatch, RecordStatus, User,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("unexpected stored value: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let constraint = db.constraint().unwrap_or_default().to_owned();
            if db.is_unique_violation() {
                return Self::UniqueViolation { constraint };
            }
            if db.is_foreign_key_violation() {
                return Self::ForeignKeyViolation { constraint };
            }
        }
        Self::Sqlx(e)
    }
}

/// A transactional store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Autocommit session for reads and single-statement writes.
    type Session: Queries;
    type Tx: Transaction;

    async fn session(&self) -> StoreResult<Self::Session>;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Round trip to the backing store.
    async fn ping(&self) -> StoreResult<()>;
}

/// An open transaction.
#[async_trait]
pub trait Transaction: Queries {
    /// Block until this transaction holds an exclusive lock on the active
    /// clinic row. Returns `false` when the clinic is absent or deleted.
    async fn lock_clinic(&mut self, clinic_id: Uuid) -> StoreResult<bool>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

/// Per-operation statements, shared by sessions and transactions.
#[async_trait]
pub trait Queries: Send {
    // Persons

    async fn find_person_by_tax_id(&mut self, tax_id_number: &str) -> StoreResult<Option<Person>>;

    /// Fails with `UniqueViolation` when an active person holds the tax id.
    async fn insert_person(&mut self, person: &Person) -> StoreResult<()>;

    async fn update_person(
        &mut self,
        id: Uuid,
        patch: &PersonPatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Person>>;

    async fn delete_person(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;

    // Clinics

    async fn find_clinic(&mut self, id: Uuid) -> StoreResult<Option<Clinic>>;

    async fn insert_clinic(&mut self, clinic: &Clinic) -> StoreResult<()>;

    async fn delete_clinic(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;

    async fn clinic_row(&mut self, id: Uuid) -> StoreResult<Option<ClinicRow>>;

    /// Active clinics with id strictly greater than `after`, ascending.
    async fn list_clinic_rows(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicRow>>;

    /// `(clinic_id, dentist_id)` pairs of active links to active dentists,
    /// ordered by clinic then dentist.
    async fn active_dentist_ids(&mut self, clinic_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Uuid)>>;

    // Bank accounts

    async fn insert_bank_account(&mut self, account: &BankAccount) -> StoreResult<()>;

    /// Soft-delete by id, only when it belongs to `clinic_id`.
    async fn delete_bank_account(
        &mut self,
        id: Uuid,
        clinic_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn list_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<Vec<BankAccount>>;

    async fn count_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<i64>;

    // Dentists

    async fn find_dentist(&mut self, id: Uuid) -> StoreResult<Option<Dentist>>;

    async fn find_dentist_by_person(&mut self, person_id: Uuid) -> StoreResult<Option<Dentist>>;

    /// Fails with `UniqueViolation` when the person already has an active dentist.
    async fn insert_dentist(&mut self, dentist: &Dentist) -> StoreResult<()>;

    async fn delete_dentist(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;

    async fn dentist_row(&mut self, id: Uuid) -> StoreResult<Option<DentistRow>>;

    // Affiliations

    async fn find_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
    ) -> StoreResult<Option<Affiliation>>;

    /// Fails with `UniqueViolation` when the pair already has an active link.
    async fn insert_affiliation(&mut self, affiliation: &Affiliation) -> StoreResult<()>;

    /// Apply supplied role flags to the active link, if any.
    async fn update_affiliation_roles(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        roles: RolePatch,
    ) -> StoreResult<Option<Affiliation>>;

    async fn count_dentist_affiliations(&mut self, dentist_id: Uuid) -> StoreResult<i64>;

    async fn end_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn end_clinic_affiliations(&mut self, clinic_id: Uuid, at: DateTime<Utc>)
        -> StoreResult<u64>;

    async fn end_dentist_affiliations(
        &mut self,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Active dentists linked to `clinic_id` with id strictly greater than
    /// `after`, ascending by dentist id.
    async fn list_clinic_dentist_rows(
        &mut self,
        clinic_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicDentistRow>>;

    // Users

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with `UniqueViolation` when the lowercased email is taken.
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
}
