//! clinics-server binary
//!
//! Usage:
//!   clinics-server --database-url postgres://localhost/clinics
//!   BIND_ADDR=0.0.0.0:8080 clinics-server --skip-migrations

use anyhow::{Context, Result};
use clap::Parser;

use clinics_core::store::{migrations, pool::create_pool_with_options, PgStore};
use clinics_core::Registry;
use clinics_server::tracing_setup::init_tracing;
use clinics_server::{ensure_bootstrap_user, run_server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // .env never overrides variables already present in the environment
    dotenvy::dotenv().ok();

    let config = Config::parse();
    init_tracing(&config.tracing())?;

    let pool = create_pool_with_options(&config.database_url, config.max_connections)
        .await
        .context("Failed to create database pool")?;

    if config.skip_migrations {
        tracing::info!("Skipping migrations");
    } else {
        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let registry = Registry::new(PgStore::new(pool));
    ensure_bootstrap_user(&registry, &config)
        .await
        .context("Failed to ensure bootstrap user")?;

    tracing::info!("Starting clinics-server on {}", config.bind);
    run_server(registry, config.server())
        .await
        .context("Server error")?;

    Ok(())
}
