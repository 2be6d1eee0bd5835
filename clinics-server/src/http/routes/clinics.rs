//! Clinic endpoints, including the clinic-scoped dentist collection

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use clinics_core::models::{
    AttachDentist, ClinicDentist, ClinicDetails, CreateClinic, RolePatch, UpdateClinic,
};
use clinics_core::store::Store;

use super::{page_response, PageParams};
use crate::http::error::ApiError;
use crate::http::extractors::{ClinicDentistPath, ValidId, ValidJson};
use crate::http::server::AppState;

/// GET /clinics
async fn list_clinics<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let request = params.request()?;
    let page = state.registry.list_clinics(request).await?;
    Ok(page_response(page, &request, uri.path()))
}

/// POST /clinics
async fn create_clinic<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidJson(input): ValidJson<CreateClinic>,
) -> Result<(StatusCode, Json<ClinicDetails>), ApiError> {
    let clinic = state.registry.create_clinic(input).await?;
    Ok((StatusCode::CREATED, Json(clinic)))
}

/// GET /clinics/{id}
async fn get_clinic<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
) -> Result<Json<ClinicDetails>, ApiError> {
    Ok(Json(state.registry.get_clinic(id).await?))
}

/// PATCH /clinics/{id}
async fn update_clinic<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
    ValidJson(input): ValidJson<UpdateClinic>,
) -> Result<Json<ClinicDetails>, ApiError> {
    Ok(Json(state.registry.update_clinic(id, input).await?))
}

/// DELETE /clinics/{id}
async fn delete_clinic<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_clinic(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /clinics/{id}/dentists
async fn list_clinic_dentists<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let request = params.request()?;
    let page = state.registry.list_clinic_dentists(id, request).await?;
    Ok(page_response(page, &request, uri.path()))
}

/// POST /clinics/{id}/dentists - 201 for a new link, 200 when it existed
async fn attach_dentist<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidId(id): ValidId,
    ValidJson(input): ValidJson<AttachDentist>,
) -> Result<(StatusCode, Json<ClinicDentist>), ApiError> {
    let (dentist, created) = state.registry.attach_dentist(id, input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(dentist)))
}

/// PATCH /clinics/{id}/dentists/{dentist_id}
async fn update_roles<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ClinicDentistPath(clinic_id, dentist_id): ClinicDentistPath,
    ValidJson(roles): ValidJson<RolePatch>,
) -> Result<Json<ClinicDentist>, ApiError> {
    let dentist = state
        .registry
        .update_affiliation_roles(clinic_id, dentist_id, roles)
        .await?;
    Ok(Json(dentist))
}

/// DELETE /clinics/{id}/dentists/{dentist_id}
async fn unlink_dentist<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ClinicDentistPath(clinic_id, dentist_id): ClinicDentistPath,
) -> Result<StatusCode, ApiError> {
    state.registry.unlink_dentist(clinic_id, dentist_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/clinics", get(list_clinics::<S>).post(create_clinic::<S>))
        .route(
            "/clinics/{id}",
            get(get_clinic::<S>)
                .patch(update_clinic::<S>)
                .delete(delete_clinic::<S>),
        )
        .route(
            "/clinics/{id}/dentists",
            get(list_clinic_dentists::<S>).post(attach_dentist::<S>),
        )
        .route(
            "/clinics/{id}/dentists/{dentist_id}",
            patch(update_roles::<S>).delete(unlink_dentist::<S>),
        )
}
