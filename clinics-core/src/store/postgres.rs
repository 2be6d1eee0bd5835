//! PostgreSQL adapter
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so the
//! crate builds without a database. Sessions and transactions share one
//! [`Queries`] implementation over anything that derefs to a connection.

use std::ops::DerefMut;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use super::records::*;
use super::{Queries, Store, StoreError, StoreResult, Transaction};
use crate::models::{PersonKind, RolePatch};

macro_rules! person_columns {
    () => {
        "p.id AS person_id, p.person_type, p.tax_id_number, p.legal_name, p.trade_name, \
         p.email, p.phone, p.created_at AS person_created_at, \
         p.updated_at AS person_updated_at, p.deleted_at AS person_deleted_at"
    };
}

macro_rules! affiliation_columns {
    () => {
        "cd.id AS affiliation_id, cd.clinic_id, cd.dentist_id, cd.is_admin, \
         cd.is_legal_representative, cd.started_at, cd.ended_at"
    };
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Statements bound to one connection, inside or outside a transaction
pub struct PgSession<C> {
    conn: C,
}

pub type PgTx = PgSession<sqlx::Transaction<'static, Postgres>>;
pub type PgConn = PgSession<PoolConnection<Postgres>>;

#[async_trait]
impl Store for PgStore {
    type Session = PgConn;
    type Tx = PgTx;

    async fn session(&self) -> StoreResult<PgConn> {
        Ok(PgSession {
            conn: self.pool.acquire().await?,
        })
    }

    async fn begin(&self) -> StoreResult<PgTx> {
        Ok(PgSession {
            conn: self.pool.begin().await?,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn lock_clinic(&mut self, clinic_id: Uuid) -> StoreResult<bool> {
        let locked: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM clinics
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(clinic_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(locked.is_some())
    }

    async fn commit(self) -> StoreResult<()> {
        self.conn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.conn.rollback().await?;
        Ok(())
    }
}

/// Release a savepoint on success, roll back to it on failure.
///
/// A failed statement aborts the enclosing Postgres transaction; running
/// race-prone inserts under a savepoint keeps it usable for the re-read.
async fn finish_savepoint<T>(
    savepoint: sqlx::Transaction<'_, Postgres>,
    result: Result<T, sqlx::Error>,
) -> StoreResult<T> {
    match result {
        Ok(value) => {
            savepoint.commit().await?;
            Ok(value)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e.into())
        }
    }
}

fn person_from(row: &PgRow) -> StoreResult<Person> {
    let person_type: String = row.try_get("person_type")?;
    let kind = PersonKind::parse(&person_type)
        .ok_or_else(|| StoreError::Decode(format!("person_type '{}'", person_type)))?;

    Ok(Person {
        id: row.try_get("person_id")?,
        kind,
        tax_id_number: row.try_get("tax_id_number")?,
        legal_name: row.try_get("legal_name")?,
        trade_name: row.try_get("trade_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("person_created_at")?,
        updated_at: row.try_get("person_updated_at")?,
        status: RecordStatus::from_deleted_at(row.try_get("person_deleted_at")?),
    })
}

fn clinic_from(row: &PgRow) -> StoreResult<Clinic> {
    Ok(Clinic {
        id: row.try_get("clinic_id")?,
        person_id: row.try_get("person_id")?,
        created_at: row.try_get("clinic_created_at")?,
        status: RecordStatus::from_deleted_at(row.try_get("clinic_deleted_at")?),
    })
}

fn dentist_from(row: &PgRow) -> StoreResult<Dentist> {
    Ok(Dentist {
        id: row.try_get("dentist_id")?,
        person_id: row.try_get("person_id")?,
        created_at: row.try_get("dentist_created_at")?,
        status: RecordStatus::from_deleted_at(row.try_get("dentist_deleted_at")?),
    })
}

fn affiliation_from(row: &PgRow) -> StoreResult<Affiliation> {
    Ok(Affiliation {
        id: row.try_get("affiliation_id")?,
        clinic_id: row.try_get("clinic_id")?,
        dentist_id: row.try_get("dentist_id")?,
        is_admin: row.try_get("is_admin")?,
        is_legal_representative: row.try_get("is_legal_representative")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
    })
}

fn bank_account_from(row: &PgRow) -> StoreResult<BankAccount> {
    Ok(BankAccount {
        id: row.try_get("id")?,
        clinic_id: row.try_get("clinic_id")?,
        bank_code: row.try_get("bank_code")?,
        branch_number: row.try_get("branch_number")?,
        account_number: row.try_get("account_number")?,
        created_at: row.try_get("created_at")?,
        status: RecordStatus::from_deleted_at(row.try_get("deleted_at")?),
    })
}

fn user_from(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl<C> Queries for PgSession<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn find_person_by_tax_id(&mut self, tax_id_number: &str) -> StoreResult<Option<Person>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            person_columns!(),
            " FROM persons p WHERE p.tax_id_number = $1 AND p.deleted_at IS NULL"
        ))
        .bind(tax_id_number)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(person_from).transpose()
    }

    async fn insert_person(&mut self, person: &Person) -> StoreResult<()> {
        let mut savepoint = Connection::begin(&mut *self.conn).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO persons (
                id, person_type, tax_id_type, tax_id_number, legal_name,
                trade_name, email, phone, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(person.id)
        .bind(person.kind.as_str())
        .bind(person.tax_id_type().as_str())
        .bind(&person.tax_id_number)
        .bind(&person.legal_name)
        .bind(person.trade_name.as_deref())
        .bind(person.email.as_deref())
        .bind(person.phone.as_deref())
        .bind(person.created_at)
        .bind(person.updated_at)
        .execute(&mut *savepoint)
        .await;

        finish_savepoint(savepoint, result).await.map(|_| ())
    }

    async fn update_person(
        &mut self,
        id: Uuid,
        patch: &PersonPatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Person>> {
        let row = sqlx::query(concat!(
            r#"
            WITH updated AS (
                UPDATE persons
                SET legal_name = COALESCE($2, legal_name),
                    trade_name = COALESCE($3, trade_name),
                    email = COALESCE($4, email),
                    phone = COALESCE($5, phone),
                    updated_at = $6
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT "#,
            person_columns!(),
            " FROM updated p"
        ))
        .bind(id)
        .bind(patch.legal_name.as_deref())
        .bind(patch.trade_name.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.phone.as_deref())
        .bind(at)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(person_from).transpose()
    }

    async fn delete_person(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE persons SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_clinic(&mut self, id: Uuid) -> StoreResult<Option<Clinic>> {
        let row = sqlx::query(
            r#"
            SELECT id AS clinic_id, person_id, created_at AS clinic_created_at,
                   deleted_at AS clinic_deleted_at
            FROM clinics
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(clinic_from).transpose()
    }

    async fn insert_clinic(&mut self, clinic: &Clinic) -> StoreResult<()> {
        sqlx::query("INSERT INTO clinics (id, person_id, created_at) VALUES ($1, $2, $3)")
            .bind(clinic.id)
            .bind(clinic.person_id)
            .bind(clinic.created_at)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_clinic(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE clinics SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .bind(at)
                .execute(&mut *self.conn)
                .await?;

        Ok(result.rows_affected())
    }

    async fn clinic_row(&mut self, id: Uuid) -> StoreResult<Option<ClinicRow>> {
        let row = sqlx::query(concat!(
            "SELECT c.id AS clinic_id, c.created_at AS clinic_created_at, \
             c.deleted_at AS clinic_deleted_at, ",
            person_columns!(),
            " FROM clinics c JOIN persons p ON p.id = c.person_id \
             WHERE c.id = $1 AND c.deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(|r| {
            Ok(ClinicRow {
                clinic: clinic_from(&r)?,
                person: person_from(&r)?,
            })
        })
        .transpose()
    }

    async fn list_clinic_rows(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicRow>> {
        let rows = sqlx::query(concat!(
            "SELECT c.id AS clinic_id, c.created_at AS clinic_created_at, \
             c.deleted_at AS clinic_deleted_at, ",
            person_columns!(),
            " FROM clinics c JOIN persons p ON p.id = c.person_id \
             WHERE c.deleted_at IS NULL AND ($1::uuid IS NULL OR c.id > $1) \
             ORDER BY c.id ASC LIMIT $2"
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ClinicRow {
                    clinic: clinic_from(r)?,
                    person: person_from(r)?,
                })
            })
            .collect()
    }

    async fn active_dentist_ids(&mut self, clinic_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Uuid)>> {
        if clinic_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT cd.clinic_id, cd.dentist_id
            FROM clinic_dentists cd
            JOIN dentists d ON d.id = cd.dentist_id
            WHERE cd.clinic_id = ANY($1)
              AND cd.ended_at IS NULL
              AND d.deleted_at IS NULL
            ORDER BY cd.clinic_id, cd.dentist_id
            "#,
        )
        .bind(clinic_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }

    async fn insert_bank_account(&mut self, account: &BankAccount) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bank_accounts (
                id, clinic_id, bank_code, branch_number, account_number, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id)
        .bind(account.clinic_id)
        .bind(&account.bank_code)
        .bind(&account.branch_number)
        .bind(&account.account_number)
        .bind(account.created_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn delete_bank_account(
        &mut self,
        id: Uuid,
        clinic_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bank_accounts
            SET deleted_at = $3
            WHERE id = $1 AND clinic_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<Vec<BankAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, clinic_id, bank_code, branch_number, account_number, created_at, deleted_at
            FROM bank_accounts
            WHERE clinic_id = $1 AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(clinic_id)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(bank_account_from).collect()
    }

    async fn count_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bank_accounts WHERE clinic_id = $1 AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    async fn find_dentist(&mut self, id: Uuid) -> StoreResult<Option<Dentist>> {
        let row = sqlx::query(
            r#"
            SELECT id AS dentist_id, person_id, created_at AS dentist_created_at,
                   deleted_at AS dentist_deleted_at
            FROM dentists
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(dentist_from).transpose()
    }

    async fn find_dentist_by_person(&mut self, person_id: Uuid) -> StoreResult<Option<Dentist>> {
        let row = sqlx::query(
            r#"
            SELECT id AS dentist_id, person_id, created_at AS dentist_created_at,
                   deleted_at AS dentist_deleted_at
            FROM dentists
            WHERE person_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(person_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(dentist_from).transpose()
    }

    async fn insert_dentist(&mut self, dentist: &Dentist) -> StoreResult<()> {
        let mut savepoint = Connection::begin(&mut *self.conn).await?;
        let result =
            sqlx::query("INSERT INTO dentists (id, person_id, created_at) VALUES ($1, $2, $3)")
                .bind(dentist.id)
                .bind(dentist.person_id)
                .bind(dentist.created_at)
                .execute(&mut *savepoint)
                .await;

        finish_savepoint(savepoint, result).await.map(|_| ())
    }

    async fn delete_dentist(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE dentists SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .bind(at)
                .execute(&mut *self.conn)
                .await?;

        Ok(result.rows_affected())
    }

    async fn dentist_row(&mut self, id: Uuid) -> StoreResult<Option<DentistRow>> {
        let row = sqlx::query(concat!(
            "SELECT d.id AS dentist_id, d.created_at AS dentist_created_at, \
             d.deleted_at AS dentist_deleted_at, ",
            person_columns!(),
            " FROM dentists d JOIN persons p ON p.id = d.person_id \
             WHERE d.id = $1 AND d.deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(|r| {
            Ok(DentistRow {
                dentist: dentist_from(&r)?,
                person: person_from(&r)?,
            })
        })
        .transpose()
    }

    async fn find_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
    ) -> StoreResult<Option<Affiliation>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            affiliation_columns!(),
            " FROM clinic_dentists cd \
             WHERE cd.clinic_id = $1 AND cd.dentist_id = $2 AND cd.ended_at IS NULL"
        ))
        .bind(clinic_id)
        .bind(dentist_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(affiliation_from).transpose()
    }

    async fn insert_affiliation(&mut self, affiliation: &Affiliation) -> StoreResult<()> {
        let mut savepoint = Connection::begin(&mut *self.conn).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_dentists (
                id, clinic_id, dentist_id, is_admin, is_legal_representative, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(affiliation.id)
        .bind(affiliation.clinic_id)
        .bind(affiliation.dentist_id)
        .bind(affiliation.is_admin)
        .bind(affiliation.is_legal_representative)
        .bind(affiliation.started_at)
        .execute(&mut *savepoint)
        .await;

        finish_savepoint(savepoint, result).await.map(|_| ())
    }

    async fn update_affiliation_roles(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        roles: RolePatch,
    ) -> StoreResult<Option<Affiliation>> {
        let row = sqlx::query(concat!(
            r#"
            UPDATE clinic_dentists cd
            SET is_admin = COALESCE($3, cd.is_admin),
                is_legal_representative = COALESCE($4, cd.is_legal_representative)
            WHERE cd.clinic_id = $1 AND cd.dentist_id = $2 AND cd.ended_at IS NULL
            RETURNING "#,
            affiliation_columns!()
        ))
        .bind(clinic_id)
        .bind(dentist_id)
        .bind(roles.is_admin)
        .bind(roles.is_legal_representative)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(affiliation_from).transpose()
    }

    async fn count_dentist_affiliations(&mut self, dentist_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clinic_dentists WHERE dentist_id = $1 AND ended_at IS NULL",
        )
        .bind(dentist_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    async fn end_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE clinic_dentists
            SET ended_at = $3
            WHERE clinic_id = $1 AND dentist_id = $2 AND ended_at IS NULL
            "#,
        )
        .bind(clinic_id)
        .bind(dentist_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn end_clinic_affiliations(
        &mut self,
        clinic_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clinic_dentists SET ended_at = $2 WHERE clinic_id = $1 AND ended_at IS NULL",
        )
        .bind(clinic_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn end_dentist_affiliations(
        &mut self,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clinic_dentists SET ended_at = $2 WHERE dentist_id = $1 AND ended_at IS NULL",
        )
        .bind(dentist_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_clinic_dentist_rows(
        &mut self,
        clinic_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicDentistRow>> {
        let rows = sqlx::query(concat!(
            "SELECT d.created_at AS dentist_created_at, d.deleted_at AS dentist_deleted_at, ",
            affiliation_columns!(),
            ", ",
            person_columns!(),
            " FROM clinic_dentists cd \
             JOIN dentists d ON d.id = cd.dentist_id \
             JOIN persons p ON p.id = d.person_id \
             WHERE cd.clinic_id = $1 AND cd.ended_at IS NULL AND d.deleted_at IS NULL \
             AND ($2::uuid IS NULL OR cd.dentist_id > $2) \
             ORDER BY cd.dentist_id ASC LIMIT $3"
        ))
        .bind(clinic_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ClinicDentistRow {
                    dentist: dentist_from(r)?,
                    person: person_from(r)?,
                    affiliation: affiliation_from(r)?,
                })
            })
            .collect()
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE lower(email) = lower($1) AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.as_ref().map(user_from).transpose()
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        let mut savepoint = Connection::begin(&mut *self.conn).await?;
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *savepoint)
        .await;

        finish_savepoint(savepoint, result).await.map(|_| ())
    }
}
