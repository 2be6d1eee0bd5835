//! HTTP routes over the in-memory store

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use clinics_core::store::MemoryStore;
use clinics_core::Registry;
use clinics_server::build_router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const CLINIC_TAX_IDS: [&str; 3] = ["00000001000136", "00000002000180", "00000003000125"];
const DENTIST_TAX_ID: &str = "10000000108";

fn app() -> Router {
    build_router(Registry::new(MemoryStore::new()), false)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

fn clinic_body(tax_id: &str) -> Value {
    json!({
        "tax_id_number": tax_id,
        "legal_name": "Acme Dental",
        "bank_accounts": [
            {"bank_code": "001", "branch_number": "1234", "account_number": "998877"}
        ]
    })
}

async fn create_clinic(app: &Router, tax_id: &str) -> String {
    let response = send(app, "POST", "/api/v1/clinics", Some(clinic_body(tax_id))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_ok() {
    let response = send(&app(), "GET", "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "ok");
}

#[tokio::test]
async fn create_returns_the_stored_clinic() {
    let app = app();
    let response = send(
        &app,
        "POST",
        "/api/v1/clinics",
        Some(clinic_body("04.252.011/0001-10")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = json_body(response).await;
    assert_eq!(created["tax_id_number"], "04252011000110");
    assert_eq!(created["legal_name"], "Acme Dental");
    assert_eq!(created["dentist_ids"], json!([]));
    let accounts = created["bank_accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["bank_code"], "001");
    assert_eq!(accounts[0]["branch_number"], "1234");
    assert_eq!(accounts[0]["account_number"], "998877");

    let uri = format!("/api/v1/clinics/{}", created["id"].as_str().unwrap());
    let response = send(&app, "GET", &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, created);
}

#[tokio::test]
async fn patch_returns_net_bank_accounts() {
    let app = app();
    let clinic_id = create_clinic(&app, CLINIC_TAX_IDS[0]).await;
    let uri = format!("/api/v1/clinics/{}", clinic_id);
    let details = json_body(send(&app, "GET", &uri, None).await).await;
    let old_id = details["bank_accounts"][0]["id"].clone();

    let response = send(
        &app,
        "PATCH",
        &uri,
        Some(json!({
            "bank_accounts": [
                {"bank_code": "341", "branch_number": "0001", "account_number": "12345"}
            ],
            "bank_account_ids_to_remove": [old_id]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let accounts = body["bank_accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["bank_code"], "341");
    assert_ne!(accounts[0]["id"], old_id);
}

#[tokio::test]
async fn duplicate_clinic_is_409() {
    let app = app();
    create_clinic(&app, CLINIC_TAX_IDS[0]).await;

    let response = send(&app, "POST", "/api/v1/clinics", Some(clinic_body(CLINIC_TAX_IDS[0]))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "conflict");
}

#[tokio::test]
async fn invalid_input_is_400() {
    let app = app();

    let mut body = clinic_body(CLINIC_TAX_IDS[0]);
    body["bank_accounts"] = json!([]);
    let response = send(&app, "POST", "/api/v1/clinics", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");

    let response = send(&app, "POST", "/api/v1/clinics", Some(json!({"legal_name": 5}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");
}

#[tokio::test]
async fn path_ids_must_be_v7() {
    let app = app();
    for uri in [
        format!("/api/v1/clinics/{}", Uuid::new_v4()),
        "/api/v1/clinics/not-a-uuid".to_owned(),
    ] {
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = send(&app, "GET", &format!("/api/v1/clinics/{}", Uuid::now_v7()), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_clinics_pages_through_headers() {
    let app = app();
    let mut ids = Vec::new();
    for tax_id in CLINIC_TAX_IDS {
        ids.push(create_clinic(&app, tax_id).await);
    }

    let response = send(&app, "GET", "/api/v1/clinics?limit=2", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-page-limit"), "2");
    let cursor = header(&response, "x-next-cursor").to_owned();
    assert_eq!(cursor, ids[1]);
    assert_eq!(
        header(&response, "link"),
        format!("</api/v1/clinics?limit=2&cursor={}>; rel=\"next\"", cursor)
    );
    let first = json_body(response).await;
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[0]["id"], ids[0].as_str());

    let uri = format!("/api/v1/clinics?limit=2&cursor={}", cursor);
    let response = send(&app, "GET", &uri, None).await;
    assert_eq!(header(&response, "x-next-cursor"), "");
    assert!(response.headers().get("link").is_none());
    let second = json_body(response).await;
    assert_eq!(second.as_array().unwrap().len(), 1);
    assert_eq!(second[0]["id"], ids[2].as_str());
}

#[tokio::test]
async fn bad_paging_parameters_are_400() {
    let app = app();
    for query in ["limit=0", "limit=101", "limit=abc", "cursor=nope"] {
        let response = send(&app, "GET", &format!("/api/v1/clinics?{}", query), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", query);
    }

    let response = send(&app, "GET", "/api/v1/clinics", None).await;
    assert_eq!(header(&response, "x-page-limit"), "20");
}

#[tokio::test]
async fn attach_update_and_unlink_dentist() {
    let app = app();
    let clinic_id = create_clinic(&app, CLINIC_TAX_IDS[0]).await;
    let dentists_uri = format!("/api/v1/clinics/{}/dentists", clinic_id);
    let attach = json!({
        "tax_id_number": DENTIST_TAX_ID,
        "legal_name": "Ana Souza",
        "is_admin": true
    });

    let response = send(&app, "POST", &dentists_uri, Some(attach.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = json_body(response).await;
    assert_eq!(first["is_admin"], true);
    assert_eq!(first["is_legal_representative"], false);
    let dentist_id = first["id"].as_str().unwrap().to_owned();

    let response = send(&app, "POST", &dentists_uri, Some(attach)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["id"], dentist_id.as_str());

    let link_uri = format!("{}/{}", dentists_uri, dentist_id);
    let response = send(&app, "PATCH", &link_uri, Some(json!({"is_legal_representative": true}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["is_legal_representative"], true);

    let response = send(&app, "PATCH", &link_uri, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Only link of this dentist
    let response = send(&app, "DELETE", &link_uri, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, "GET", &dentists_uri, None).await;
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn removing_last_bank_account_is_400() {
    let app = app();
    let clinic_id = create_clinic(&app, CLINIC_TAX_IDS[0]).await;
    let uri = format!("/api/v1/clinics/{}", clinic_id);

    let details = json_body(send(&app, "GET", &uri, None).await).await;
    let account_id = details["bank_accounts"][0]["id"].clone();

    let response = send(
        &app,
        "PATCH",
        &uri,
        Some(json!({"bank_account_ids_to_remove": [account_id]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "clinic must retain at least one active bank account"
    );

    let details = json_body(send(&app, "GET", &uri, None).await).await;
    assert_eq!(details["bank_accounts"][0]["id"], account_id);
}

#[tokio::test]
async fn delete_clinic_and_dentist() {
    let app = app();
    let clinic_id = create_clinic(&app, CLINIC_TAX_IDS[0]).await;
    let attach = json!({"tax_id_number": DENTIST_TAX_ID, "legal_name": "Ana Souza"});
    let response = send(
        &app,
        "POST",
        &format!("/api/v1/clinics/{}/dentists", clinic_id),
        Some(attach),
    )
    .await;
    let dentist_id = json_body(response).await["id"].as_str().unwrap().to_owned();

    let dentist_uri = format!("/api/v1/dentists/{}", dentist_id);
    let response = send(&app, "PATCH", &dentist_uri, Some(json!({"phone": "+55 11 5555-0000"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["phone"], "+55 11 5555-0000");

    let response = send(&app, "DELETE", &dentist_uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, "DELETE", &dentist_uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let clinic_uri = format!("/api/v1/clinics/{}", clinic_id);
    let response = send(&app, "DELETE", &clinic_uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, "GET", &clinic_uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
