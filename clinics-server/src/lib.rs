//! clinics-server: HTTP transport for the clinic registry
//!
//! Routes live under `/api/v1` and delegate to [`clinics_core::Registry`].
//! Authentication is handled in front of this server.

pub mod bootstrap;
pub mod config;
pub mod http;
pub mod tracing_setup;

pub use bootstrap::ensure_bootstrap_user;
pub use config::Config;
pub use http::{build_router, run_server, ApiError, AppState, ServerConfig};
