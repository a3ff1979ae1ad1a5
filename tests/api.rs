use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use campus_ride::{
    config::AppConfig,
    db::{self, init_pool},
    models::user::RiderApproval,
    routes::create_router,
    state::AppState,
};
use chrono::Duration;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    state: AppState,
    router: Router,
    _root: TempDir,
}

async fn test_app() -> TestApp {
    let root = TempDir::new().expect("temp dir");
    let db_path = root.path().join("api.sqlite");
    let config = AppConfig {
        database_url: format!("sqlite://{}", db_path.to_string_lossy()),
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cookie_secret: "api-test-cookie-secret".into(),
        session_ttl: Duration::hours(1),
        static_root: None,
        admin_key: Some("test-admin-key".into()),
    };
    let pool = init_pool(&config.database_url).await.expect("pool");
    db::migrate(&pool).await.expect("migrations");
    let state = AppState::new(config, pool);
    TestApp {
        router: create_router(state.clone()),
        state,
        _root: root,
    }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let body = body.map(|json| json.to_string());
    send_raw(app, method, uri, cookie, body.as_deref()).await
}

async fn send_raw(
    app: &TestApp,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(text) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(text.to_owned())
        }
        None => Body::empty(),
    };
    let response = app
        .router
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, set_cookie, json)
}

fn registration(email: &str) -> Value {
    json!({
        "email": email,
        "password": "secret123",
        "first_name": "Test",
        "last_name": "User",
        "phone": "0800000000",
        "student_code": "6400001",
        "licence_no": "DL-1234"
    })
}

#[tokio::test]
async fn health_reports_database() {
    let app = test_app().await;
    let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn fare_quote_follows_the_tiers() {
    let app = test_app().await;
    let (status, _, body) = send(&app, Method::GET, "/api/fare?distance_km=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fare"], 40);

    let (_, _, body) = send(&app, Method::GET, "/api/fare?distance_km=23", None, None).await;
    assert_eq!(body["fare"], 70);

    let (_, _, body) = send(&app, Method::GET, "/api/fare?distance_km=0", None, None).await;
    assert!(body["fare"].is_null());
}

#[tokio::test]
async fn registration_starts_a_session() {
    let app = test_app().await;
    let (status, cookie, body) = send(
        &app,
        Method::POST,
        "/api/register/student",
        None,
        Some(registration("nok@campus.test")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "student");
    let cookie = cookie.expect("session cookie");

    let (status, _, body) = send(&app, Method::GET, "/api/profile", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "nok@campus.test");

    let (status, _, body) = send(&app, Method::GET, "/api/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn login_with_the_wrong_portal_is_refused() {
    let app = test_app().await;
    send(
        &app,
        Method::POST,
        "/api/register/student",
        None,
        Some(registration("nok@campus.test")),
    )
    .await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "nok@campus.test", "password": "secret123", "role": "rider" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, cookie, _) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "nok@campus.test", "password": "secret123", "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
}

#[tokio::test]
async fn riders_need_approval_before_seeing_trips() {
    let app = test_app().await;
    let (_, cookie, body) = send(
        &app,
        Method::POST,
        "/api/register/rider",
        None,
        Some(registration("bike@campus.test")),
    )
    .await;
    let cookie = cookie.expect("session cookie");
    assert_eq!(body["approval"], "pending");

    let (status, _, _) = send(&app, Method::GET, "/api/riders/pending-trips", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let rider_id = body["id"].as_i64().expect("rider id");
    app.state
        .users
        .set_rider_approval(rider_id, RiderApproval::Approved)
        .await
        .expect("approve");

    let (status, _, body) = send(&app, Method::GET, "/api/riders/pending-trips", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "no_vehicles_registered");

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/riders/vehicles",
        Some(&cookie),
        Some(json!({ "vehicle_type": "motorcycle", "plate": "1กข 234", "brand": "Honda", "model": "Wave" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, body) = send(&app, Method::GET, "/api/riders/pending-trips", Some(&cookie), None).await;
    assert_eq!(body["outcome"], "no_matching_vehicle");
}

#[tokio::test]
async fn students_cannot_use_admin_routes() {
    let app = test_app().await;
    let (_, cookie, _) = send(
        &app,
        Method::POST,
        "/api/register/student",
        None,
        Some(registration("nok@campus.test")),
    )
    .await;
    let cookie = cookie.expect("session cookie");
    let (status, _, body) = send(&app, Method::GET, "/api/admin/reports", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

async fn admin_session(app: &TestApp) -> String {
    let mut form = registration("admin@campus.test");
    form["admin_key"] = json!("test-admin-key");
    let (status, cookie, body) =
        send(app, Method::POST, "/api/register/admin", None, Some(form)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "admin");
    cookie.expect("session cookie")
}

#[tokio::test]
async fn admin_sign_up_needs_the_shared_key() {
    let app = test_app().await;
    let mut form = registration("admin@campus.test");
    form["admin_key"] = json!("guess");
    let (status, cookie, body) =
        send(&app, Method::POST, "/api/register/admin", None, Some(form)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(cookie.is_none());

    let cookie = admin_session(&app).await;
    let (status, _, _) = send(&app, Method::GET, "/api/admin/reports", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admins_manage_student_and_rider_accounts() {
    let app = test_app().await;
    let admin = admin_session(&app).await;

    let (status, cookie, student) = send(
        &app,
        Method::POST,
        "/api/admin/students",
        Some(&admin),
        Some(registration("nok@campus.test")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(cookie.is_none());
    assert_eq!(student["role"], "student");
    let student_id = student["id"].as_i64().expect("student id");

    let (status, _, body) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/students/{student_id}"),
        Some(&admin),
        Some(json!({ "first_name": "Nok", "phone": "0811111111" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Nok");
    assert_eq!(body["email"], "nok@campus.test");

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/api/admin/students/{student_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "0811111111");

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/api/admin/riders/{student_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _, rider) = send(
        &app,
        Method::POST,
        "/api/admin/riders",
        Some(&admin),
        Some(registration("bike@campus.test")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rider["approval"], "pending");
    let rider_id = rider["id"].as_i64().expect("rider id");

    let (status, _, body) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/riders/{rider_id}"),
        Some(&admin),
        Some(json!({ "email": "nok@campus.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, _, riders) = send(&app, Method::GET, "/api/admin/riders", Some(&admin), None).await;
    assert_eq!(riders.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = test_app().await;
    let (status, _, body) =
        send(&app, Method::GET, "/api/fare?distance_km=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _, body) = send_raw(&app, Method::POST, "/api/login", None, Some("{")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let admin = admin_session(&app).await;
    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/admin/students/not-a-number",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn students_see_a_reduced_rider_profile() {
    let app = test_app().await;
    let mut form = registration("bike@campus.test");
    form["national_id"] = json!("1100000000001");
    let (_, rider_cookie, rider) =
        send(&app, Method::POST, "/api/register/rider", None, Some(form)).await;
    let rider_cookie = rider_cookie.expect("rider session");
    let rider_id = rider["id"].as_i64().expect("rider id");
    send(
        &app,
        Method::POST,
        "/api/riders/vehicles",
        Some(&rider_cookie),
        Some(json!({ "vehicle_type": "car", "plate": "กข 1234", "brand": "Toyota", "model": "Yaris" })),
    )
    .await;

    let (_, cookie, _) = send(
        &app,
        Method::POST,
        "/api/register/student",
        None,
        Some(registration("nok@campus.test")),
    )
    .await;
    let cookie = cookie.expect("student session");

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/api/students/riders/{rider_id}"),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Test");
    assert_eq!(body["phone"], "0800000000");
    assert!(body["rating"].is_null());
    assert_eq!(body["vehicles"][0]["plate"], "กข 1234");
    for hidden in ["email", "national_id", "licence_no", "approval"] {
        assert!(body.get(hidden).is_none(), "{hidden} leaked");
    }
}
