//! Dentist endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::patch, Json, Router};
use clinics_core::models::{DentistSummary, UpdateDentist};
use clinics_core::store::Store;

use crate::http::error::ApiError;
use crate::http::extractors::{ValidId, ValidJson};
use crate::http::server::AppState;

/// PATCH /dentists/{id}
async fn update_dentist<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
    ValidJson(input): ValidJson<UpdateDentist>,
) -> Result<Json<DentistSummary>, ApiError> {
    Ok(Json(state.registry.update_dentist(id, input).await?))
}

/// DELETE /dentists/{id} - ends every active link of the dentist
async fn delete_dentist<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_dentist(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new().route(
        "/dentists/{id}",
        patch(update_dentist::<S>).delete(delete_dentist::<S>),
    )
}
