//! Command line and environment configuration
//!
//! Every flag falls back to an environment variable. `main` loads a `.env`
//! file first, so values there apply unless the process environment
//! already sets them.

use std::net::SocketAddr;

use clap::Parser;
use clinics_core::store::pool::DEFAULT_MAX_CONNECTIONS;

use crate::http::ServerConfig;
use crate::tracing_setup::TracingConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "clinics-server", version, about = "Clinic registry HTTP server")]
pub struct Config {
    /// Address to bind to
    #[arg(long, short = 'b', env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Upper bound on pooled connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long, env = "CORS_PERMISSIVE")]
    pub cors_permissive: bool,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(long)]
    pub debug: bool,

    /// Do not create the schema on startup
    #[arg(long, env = "SKIP_MIGRATIONS")]
    pub skip_migrations: bool,

    /// Login user to ensure on startup
    #[arg(long, env = "AUTH_BOOTSTRAP_EMAIL", requires = "bootstrap_password_hash")]
    pub bootstrap_email: Option<String>,

    /// Password hash for the bootstrap user, as produced by the auth service
    #[arg(
        long,
        env = "AUTH_BOOTSTRAP_PASSWORD_HASH",
        hide_env_values = true,
        requires = "bootstrap_email"
    )]
    pub bootstrap_password_hash: Option<String>,
}

impl Config {
    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind,
            cors_permissive: self.cors_permissive,
        }
    }

    /// Email and password hash, when both are set and non-blank.
    pub fn bootstrap_user(&self) -> Option<(&str, &str)> {
        let email = self.bootstrap_email.as_deref().map(str::trim)?;
        let hash = self.bootstrap_password_hash.as_deref().map(str::trim)?;
        (!email.is_empty() && !hash.is_empty()).then_some((email, hash))
    }

    pub fn tracing(&self) -> TracingConfig {
        TracingConfig { debug: self.debug }
    }
}
