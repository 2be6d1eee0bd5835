//! Liveness plus a store round trip

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use clinics_core::store::Store;
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    fn new(store_ok: bool) -> (StatusCode, Self) {
        let (status, code) = if store_ok {
            ("ok", StatusCode::OK)
        } else {
            ("degraded", StatusCode::SERVICE_UNAVAILABLE)
        };
        let body = Self {
            status,
            store: if store_ok { "ok" } else { "unreachable" },
            version: env!("CARGO_PKG_VERSION"),
        };
        (code, body)
    }
}

/// GET /health - 503 while the store cannot be reached
async fn health<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.registry.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unreachable");
            false
        }
    };
    let (code, body) = HealthResponse::new(store_ok);
    (code, Json(body))
}

pub fn router<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/health", get(health::<S>))
}
