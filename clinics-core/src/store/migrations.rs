//! Schema migrations for the registry tables
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so running on startup is
//! safe. Uniqueness of active rows lives in partial unique indexes; the
//! store relies on them to detect creation races.

use sqlx::PgPool;

/// Run all registry migrations
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("running registry migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id UUID PRIMARY KEY,
            person_type TEXT NOT NULL,
            tax_id_type TEXT NOT NULL,
            tax_id_number TEXT NOT NULL,
            legal_name TEXT NOT NULL,
            trade_name TEXT,
            email TEXT,
            phone TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ,
            CONSTRAINT persons_type_matches_tax_id CHECK (
                (person_type = 'INDIVIDUAL' AND tax_id_type = 'CPF')
                OR (person_type = 'COMPANY' AND tax_id_type = 'CNPJ')
            )
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clinics (
            id UUID PRIMARY KEY,
            person_id UUID NOT NULL REFERENCES persons(id) ON DELETE RESTRICT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dentists (
            id UUID PRIMARY KEY,
            person_id UUID NOT NULL REFERENCES persons(id) ON DELETE RESTRICT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clinic_dentists (
            id UUID PRIMARY KEY,
            clinic_id UUID NOT NULL REFERENCES clinics(id) ON DELETE RESTRICT,
            dentist_id UUID NOT NULL REFERENCES dentists(id) ON DELETE RESTRICT,
            is_admin BOOLEAN NOT NULL DEFAULT FALSE,
            is_legal_representative BOOLEAN NOT NULL DEFAULT FALSE,
            started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            ended_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_accounts (
            id UUID PRIMARY KEY,
            clinic_id UUID NOT NULL REFERENCES clinics(id) ON DELETE RESTRICT,
            bank_code TEXT NOT NULL,
            branch_number TEXT NOT NULL,
            account_number TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active row per natural key
    let unique_indexes = [
        "CREATE UNIQUE INDEX IF NOT EXISTS persons_tax_id_active_key ON persons(tax_id_number) WHERE deleted_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS clinics_person_active_key ON clinics(person_id) WHERE deleted_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS dentists_person_active_key ON dentists(person_id) WHERE deleted_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS clinic_dentists_active_key ON clinic_dentists(clinic_id, dentist_id) WHERE ended_at IS NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS users_email_active_key ON users(lower(email)) WHERE deleted_at IS NULL",
    ];

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_clinic_dentists_dentist ON clinic_dentists(dentist_id) WHERE ended_at IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_bank_accounts_clinic ON bank_accounts(clinic_id) WHERE deleted_at IS NULL",
    ];

    for idx in unique_indexes.iter().chain(indexes.iter()) {
        sqlx::query(idx).execute(pool).await?;
    }

    tracing::info!("registry migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_are_idempotent() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::store::create_pool(&url).await.expect("pool creation failed");

        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");

        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = 'clinic_dentists_active_key')",
        )
        .fetch_one(&pool)
        .await
        .expect("query failed");
        assert!(exists);
    }
}
