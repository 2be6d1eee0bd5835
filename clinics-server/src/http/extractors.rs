//! Custom Axum extractors

use axum::extract::{FromRequest, FromRequestParts, Json, Path, Request};
use axum::http::request::Parts;
use clinics_core::ids::is_time_ordered;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;

const MUST_BE_V7: &str = "must be a UUIDv7";

fn parse_id(name: &'static str, raw: &str) -> Result<Uuid, ApiError> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if is_time_ordered(&id) => Ok(id),
        _ => Err(ApiError::invalid_parameter(name, MUST_BE_V7)),
    }
}

/// Extract a UUIDv7 from a single-segment path like `/clinics/{id}`
pub struct ValidId(pub Uuid);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_parameter("id", MUST_BE_V7))?;

        Ok(Self(parse_id("id", &id)?))
    }
}

/// Extract `(clinic_id, dentist_id)` from `/clinics/{id}/dentists/{dentist_id}`
///
/// A rejection names the first segment that is missing or not a UUIDv7.
pub struct ClinicDentistPath(pub Uuid, pub Uuid);

impl<S> FromRequestParts<S> for ClinicDentistPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(segments): Path<Vec<(String, String)>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_parameter("id", MUST_BE_V7))?;

        let segment = |name: &'static str| {
            segments
                .iter()
                .find(|(key, _)| key == name)
                .ok_or_else(|| ApiError::invalid_parameter(name, MUST_BE_V7))
                .and_then(|(_, raw)| parse_id(name, raw))
        };
        Ok(Self(segment("id")?, segment("dentist_id")?))
    }
}

/// JSON body whose decode failures answer in the API error format
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidBody {
                message: rejection.body_text(),
            })?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn link_ids(ClinicDentistPath(clinic, dentist): ClinicDentistPath) -> String {
        format!("{} {}", clinic, dentist)
    }

    async fn call(uri: &str) -> (StatusCode, String) {
        let app = Router::new().route("/clinics/{id}/dentists/{dentist_id}", get(link_ids));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn rejection_names_the_bad_segment() {
        let v7 = Uuid::now_v7();

        let (status, body) = call(&format!("/clinics/nope/dentists/{}", v7)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains(r#"\"id\""#), "{}", body);
        assert!(!body.contains("dentist_id"), "{}", body);

        let (status, body) = call(&format!("/clinics/{}/dentists/{}", v7, Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("dentist_id"), "{}", body);
    }

    #[tokio::test]
    async fn both_segments_parse() {
        let (clinic, dentist) = (Uuid::now_v7(), Uuid::now_v7());
        let (status, body) = call(&format!("/clinics/{}/dentists/{}", clinic, dentist)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{} {}", clinic, dentist));
    }

    #[test]
    fn only_v7_ids_parse() {
        let v7 = Uuid::now_v7();
        assert_eq!(parse_id("id", &v7.to_string()).unwrap(), v7);
        assert_eq!(parse_id("id", &format!(" {} ", v7)).unwrap(), v7);
        assert!(parse_id("id", &Uuid::new_v4().to_string()).is_err());
        assert!(parse_id("id", "not-a-uuid").is_err());
        assert!(parse_id("id", "").is_err());
    }
}
