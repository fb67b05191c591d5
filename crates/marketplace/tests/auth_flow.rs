//! End-to-end flows through the router against a mocked Supabase project.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zesty_marketplace::config::{MarketplaceConfig, SupabaseConfig};
use zesty_marketplace::routes;
use zesty_marketplace::state::AppState;

const USER_ID: &str = "6f1c2d3e-0000-4000-8000-000000000001";
const AD_ID: &str = "9a8b7c6d-0000-4000-8000-0000000000aa";
const BOUNDARY: &str = "zesty-test-boundary";

fn config_for(server: &MockServer) -> MarketplaceConfig {
    MarketplaceConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        supabase: SupabaseConfig {
            url: Url::parse(&server.uri()).unwrap(),
            anon_key: SecretString::from("anon-key-for-tests"),
            storage_bucket: "images".to_string(),
            request_timeout: Duration::from_secs(2),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

fn app_for(server: &MockServer) -> Router {
    routes::app(AppState::new(config_for(server)).unwrap())
}

fn token_response(email: &str) -> Value {
    json!({
        "access_token": "access-1",
        "token_type": "bearer",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "user": {
            "id": USER_ID,
            "email": email,
            "email_confirmed_at": "2024-05-01T10:00:00Z"
        }
    })
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// The `name=value` part of the session cookie.
fn session_cookie(response: &Response<Body>) -> String {
    let raw = response.headers()[header::SET_COOKIE].to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

/// Multipart upload with an `order` field and a small PNG.
fn image_upload(uri: &str, cookie: &str, order: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"order\"\r\n\r\n\
         {order}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"bike.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNG\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn mount_sign_in(server: &MockServer, email: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(email)))
        .mount(server)
        .await;
}

async fn mount_profile(server: &MockServer, table: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{table}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_register_then_sign_in_lands_on_user_profile() {
    let server = MockServer::start().await;
    let ann = json!({
        "id": USER_ID,
        "email": "a@x.com",
        "full_name": "Ann",
        "phone": "555",
        "profile_image": null
    });

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({ "email": "a@x.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("a@x.com")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/normal_user"))
        .and(body_partial_json(json!({ "id": USER_ID, "full_name": "Ann" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([ann.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&server);

    let response = app
        .clone()
        .oneshot(form_post(
            "/register?type=normal",
            "email=a%40x.com&password=pw123456&full_name=Ann&phone=555",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?success=registered");

    mount_sign_in(&server, "a@x.com").await;
    mount_profile(&server, "business_owner", json!([])).await;
    mount_profile(&server, "normal_user", json!([ann])).await;

    let response = app
        .clone()
        .oneshot(form_post("/login", "email=a%40x.com&password=pw123456"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user-profile");
    let cookie = session_cookie(&response);

    let response = app
        .oneshot(get("/user-profile", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Ann"));
}

#[tokio::test]
async fn test_business_account_is_kept_off_the_individual_page() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "shop@x.com").await;
    mount_profile(
        &server,
        "business_owner",
        json!([{
            "id": USER_ID,
            "email": "shop@x.com",
            "full_name": "Bea",
            "phone": "555",
            "business_name": "Bea's Beans",
            "business_address": "1 Main St",
            "profile_image": null
        }]),
    )
    .await;

    let app = app_for(&server);

    let response = app
        .clone()
        .oneshot(form_post("/login", "email=shop%40x.com&password=pw123456"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/business-dashboard");
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(get("/user-profile", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/business-dashboard");

    let response = app
        .oneshot(get("/business-dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("1 Main St"));
}

#[tokio::test]
async fn test_wrong_password_returns_to_sign_in_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(form_post("/login", "email=a%40x.com&password=nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=credentials");
}

#[tokio::test]
async fn test_invalid_business_registration_never_reaches_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(form_post(
            "/register?type=business",
            "email=b%40x.com&password=pw123456&full_name=Bea&phone=555&business_name=Beans&business_address=",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/register?type=business&error=missing_business_address"
    );
}

#[tokio::test]
async fn test_pages_without_session_or_kind_redirect_to_sign_in() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    for uri in ["/user-profile", "/business-dashboard", "/account", "/register"] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login", "{uri}");
    }
}

#[tokio::test]
async fn test_readiness_follows_auth_health() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let response = app.clone().oneshot(get("/health/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    Mock::given(method("GET"))
        .and(path("/auth/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "GoTrue" })))
        .mount(&server)
        .await;

    let response = app.oneshot(get("/health/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

fn ann_row() -> Value {
    json!({
        "id": USER_ID,
        "email": "a@x.com",
        "full_name": "Ann",
        "phone": "555",
        "profile_image": null
    })
}

/// Sign Ann in and return the session cookie.
async fn signed_in_cookie(app: &Router, server: &MockServer) -> String {
    mount_sign_in(server, "a@x.com").await;
    mount_profile(server, "business_owner", json!([])).await;
    mount_profile(server, "normal_user", json!([ann_row()])).await;

    let response = app
        .clone()
        .oneshot(form_post("/login", "email=a%40x.com&password=pw123456"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/user-profile");
    session_cookie(&response)
}

async fn refuse_storage_writes(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex("^/storage/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stored_mixed_case_email_still_resolves_business() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "shop@x.com").await;
    mount_profile(
        &server,
        "business_owner",
        json!([{
            "id": USER_ID,
            "email": "Shop@X.com",
            "full_name": "Bea",
            "phone": "555",
            "business_name": "Bea's Beans",
            "business_address": "1 Main St",
            "profile_image": null
        }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/normal_user"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(form_post("/login", "email=shop%40x.com&password=pw123456"))
        .await
        .unwrap();

    assert_eq!(location(&response), "/business-dashboard");
}

#[tokio::test]
async fn test_unconfirmed_sign_in_reaches_sign_in_page_with_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "error_code": "email_not_confirmed",
            "msg": "Email not confirmed"
        })))
        .mount(&server)
        .await;
    mount_profile(&server, "business_owner", json!([])).await;
    mount_profile(&server, "normal_user", json!([ann_row()])).await;

    let app = app_for(&server);

    let response = app
        .clone()
        .oneshot(form_post("/login", "email=a%40x.com&password=pw123456"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let next = location(&response).to_owned();
    assert_eq!(next, "/user-profile?error=unconfirmed");

    let response = app.clone().oneshot(get(&next, None)).await.unwrap();
    assert_eq!(location(&response), "/login?error=unconfirmed");

    let response = app
        .oneshot(get("/login?error=unconfirmed", None))
        .await
        .unwrap();
    assert!(
        body_text(response)
            .await
            .contains("Please confirm your email address")
    );
}

#[tokio::test]
async fn test_upload_needs_a_session() {
    let server = MockServer::start().await;
    refuse_storage_writes(&server).await;

    let response = app_for(&server)
        .oneshot(image_upload(&format!("/ads/{AD_ID}/images"), "other=1", "0"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_upload_with_traversing_id_never_touches_storage() {
    let server = MockServer::start().await;
    let app = app_for(&server);
    let cookie = signed_in_cookie(&app, &server).await;
    refuse_storage_writes(&server).await;

    let response = app
        .oneshot(image_upload(
            "/ads/..%2F..%2Fother-bucket%2Fevil/images",
            &cookie,
            "0",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/ads?error=unknown_advertisement");
}

#[tokio::test]
async fn test_upload_with_malformed_order_is_refused() {
    let server = MockServer::start().await;
    let app = app_for(&server);
    let cookie = signed_in_cookie(&app, &server).await;
    refuse_storage_writes(&server).await;

    let response = app
        .oneshot(image_upload(&format!("/ads/{AD_ID}/images"), &cookie, "two"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/ads/{AD_ID}?error=invalid_upload")
    );
}
