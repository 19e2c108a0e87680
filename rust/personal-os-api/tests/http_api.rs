//! In-process HTTP tests over the full router.
//!
//! Each test builds a fresh app on an in-memory database with in-memory
//! object storage and drives it through `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use personal_os_api::billing::compute_signature;
use personal_os_api::config::{AppConfig, StorageBackend};
use personal_os_api::server::create_app;

const WEBHOOK_SECRET: &str = "whsec_integration";

async fn app() -> Router {
    let mut config = AppConfig::default();
    config.gateway.jwt_secret = Some("integration-test-secret-value".to_string());
    config.database.path = ":memory:".to_string();
    config.storage.backend = StorageBackend::Memory;
    config.billing.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    let (router, _state) = create_app(config).await.unwrap();
    router
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    read_json(app.clone().oneshot(request).await.unwrap()).await
}

async fn signup(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": email, "password": "long-enough-pw", "name": "Tester" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn daily_review(date: &str) -> Value {
    json!({
        "type": "DAILY",
        "date": date,
        "content": {
            "energyLevel": 7,
            "meaningfulWin": "shipped the release",
            "frictionPoint": "meetings",
            "letGoOf": "perfect inbox",
            "tomorrowPriority": "write the plan"
        }
    })
}

fn goal(title: &str) -> Value {
    json!({
        "timeframe": "ONE_YEAR",
        "title": title,
        "category": "Health",
        "content": {
            "what": "Run a marathon",
            "why": "health",
            "successLooksLike": "finish under 4h",
            "firstAction": "sign up"
        }
    })
}

#[tokio::test]
async fn test_health_is_public_and_api_is_not() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], true);
    assert_eq!(body["collaborators"]["storage"], true);

    let (status, body) = send(&app, Method::GET, "/api/v1/reviews", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/v1/reviews", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_login_and_me() {
    let app = app().await;
    let (token, user_id) = signup(&app, "Ada@Example.com").await;

    let (status, me) = send(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["userId"], user_id.as_str());
    assert_eq!(me["email"], "ada@example.com");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": "ada@example.com", "password": "another-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "ADA@example.com", "password": "long-enough-pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (wrong_pw, wrong_pw_body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "nope-nope-nope" })),
    )
    .await;
    let (unknown, unknown_body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "nope-nope-nope" })),
    )
    .await;
    assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw_body["message"], unknown_body["message"]);
}

#[tokio::test]
async fn test_short_password_rejected() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "email": "short@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_signup_materializes_core_documents() {
    let app = app().await;
    let (token, _) = signup(&app, "docs@example.com").await;

    let (status, docs) = send(&app, Method::GET, "/api/v1/documents", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let docs = docs.as_array().unwrap();
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| d["isFramework"] == false));

    let (status, framework) = send(
        &app,
        Method::GET,
        "/api/v1/documents/types/framework_life_map",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(framework["type"], "FRAMEWORK_LIFE_MAP");
    assert_eq!(framework["isFramework"], true);

    // Second view returns the same row.
    let (_, again) = send(
        &app,
        Method::GET,
        "/api/v1/documents/types/FRAMEWORK_LIFE_MAP",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(again["id"], framework["id"]);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/documents",
        Some(&token),
        Some(json!({ "type": "PRINCIPLES" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_review_lifecycle_and_conflict() {
    let app = app().await;
    let (token, _) = signup(&app, "reviews@example.com").await;

    let (status, review) = send(&app, Method::POST, "/api/v1/reviews", Some(&token), Some(daily_review("2024-03-10"))).await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    assert_eq!(review["date"], "2024-03-10");
    let id = review["id"].as_str().unwrap().to_string();

    // Same kind and calendar day, given as a timestamp.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/reviews",
        Some(&token),
        Some(daily_review("2024-03-10T21:15:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let mut bad = daily_review("2024-03-11");
    bad["content"]["energyLevel"] = json!(11);
    let (status, _) = send(&app, Method::POST, "/api/v1/reviews", Some(&token), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut patched = daily_review("2024-03-10")["content"].clone();
    patched["meaningfulWin"] = json!("closed the round");
    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/reviews/{id}"),
        Some(&token),
        Some(json!({ "content": patched })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"]["meaningfulWin"], "closed the round");

    let (status, list) = send(&app, Method::GET, "/api/v1/reviews?type=daily&limit=abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/reviews/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/reviews/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_entries_are_invisible_to_other_users() {
    let app = app().await;
    let (owner, _) = signup(&app, "owner@example.com").await;
    let (intruder, _) = signup(&app, "intruder@example.com").await;

    let (_, goal) = send(&app, Method::POST, "/api/v1/goals", Some(&owner), Some(goal("Marathon"))).await;
    let uri = format!("/api/v1/goals/{}", goal["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::GET, &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&intruder), Some(json!({ "title": "Mine" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Marathon");
}

#[tokio::test]
async fn test_goal_patch_clears_and_validates() {
    let app = app().await;
    let (token, _) = signup(&app, "goals@example.com").await;

    let (status, created) = send(&app, Method::POST, "/api/v1/goals", Some(&token), Some(goal("Marathon"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/goals/{}", created["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "category": null, "status": "completed", "progress": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["category"].is_null());
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["title"], "Marathon");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({ "progress": 11 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/v1/goals", Some(&token), Some(goal("  "))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_aggregates() {
    let app = app().await;
    let (token, _) = signup(&app, "dash@example.com").await;

    for date in ["2024-03-10", "2024-03-09", "2024-03-07"] {
        let (status, _) = send(&app, Method::POST, "/api/v1/reviews", Some(&token), Some(daily_review(date))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, done) = send(&app, Method::POST, "/api/v1/goals", Some(&token), Some(goal("Done"))).await;
    send(
        &app,
        Method::PATCH,
        &format!("/api/v1/goals/{}", done["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "status": "completed" })),
    )
    .await;
    send(&app, Method::POST, "/api/v1/goals", Some(&token), Some(goal("Open"))).await;

    let (status, dash) = send(&app, Method::GET, "/api/v1/dashboard?today=2024-03-10", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["streak"], 2);
    assert_eq!(dash["todayHasReview"], true);
    assert_eq!(dash["totalReviews"], 3);
    assert_eq!(dash["completedGoals"], 1);
    assert_eq!(dash["totalGoals"], 2);
    assert_eq!(dash["goalCompletionRate"], 50);
    assert_eq!(dash["recentReviews"][0]["date"], "2024-03-10");
}

#[tokio::test]
async fn test_webhook_with_bad_signature_changes_nothing() {
    let app = app().await;
    let (token, user_id) = signup(&app, "billing@example.com").await;

    let payload = json!({
        "id": "evt_1",
        "type": "customer.subscription.updated",
        "data": { "object": {
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "items": { "data": [{ "price": { "id": "price_pro" } }] },
            "metadata": { "userId": user_id }
        }}
    })
    .to_string();
    let now = chrono::Utc::now().timestamp();

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/billing/webhook")
        .header("stripe-signature", format!("t={now},v1={}", "ab".repeat(32)))
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, _) = read_json(app.clone().oneshot(forged).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, subscription) = send(&app, Method::GET, "/api/v1/billing/subscription", Some(&token), None).await;
    assert!(subscription.is_null());

    let signature = compute_signature(WEBHOOK_SECRET, now, payload.as_bytes()).unwrap();
    let genuine = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/billing/webhook")
        .header("stripe-signature", format!("t={now},v1={signature}"))
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = read_json(app.clone().oneshot(genuine).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (_, subscription) = send(&app, Method::GET, "/api/v1/billing/subscription", Some(&token), None).await;
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["stripeCustomerId"], "cus_1");

    let (status, _) = send(&app, Method::POST, "/api/v1/billing/checkout", Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

fn multipart(file_name: &str, content_type: &str, data: &str, category: Option<&str>) -> Request<Body> {
    let boundary = "X-PERSONAL-OS-BOUNDARY";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n{data}\r\n"
    );
    if let Some(category) = category {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\n{category}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/uploads")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_flow_with_memory_storage() {
    let app = app().await;
    let (token, _) = signup(&app, "files@example.com").await;
    let auth = format!("Bearer {token}");

    let mut request = multipart("notes.txt", "text/plain", "hello world", Some("journal"));
    request.headers_mut().insert(header::AUTHORIZATION, auth.parse().unwrap());
    let (status, upload) = read_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED, "{upload}");
    assert_eq!(upload["fileName"], "notes.txt");
    assert_eq!(upload["fileSize"], 11);
    assert_eq!(upload["category"], "journal");
    let id = upload["id"].as_str().unwrap().to_string();

    let (status, link) = send(&app, Method::GET, &format!("/api/v1/uploads/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(link["url"].as_str().unwrap().starts_with("memory://"));

    let (_, listed) = send(&app, Method::GET, "/api/v1/uploads?category=journal", Some(&token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let mut request = multipart("tool.exe", "application/x-msdownload", "MZ", None);
    request.headers_mut().insert(header::AUTHORIZATION, auth.parse().unwrap());
    let (status, _) = read_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/uploads/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/uploads/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_editing_session_saves_document() {
    let app = app().await;
    let (token, _) = signup(&app, "editor@example.com").await;

    let (_, doc) = send(&app, Method::GET, "/api/v1/documents/types/NORTH_STAR", Some(&token), None).await;
    let id = doc["id"].as_str().unwrap().to_string();
    let session = format!("/api/v1/documents/{id}/session");

    let (status, opened) = send(&app, Method::POST, &session, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["state"], "idle");

    let (status, edited) = send(
        &app,
        Method::PUT,
        &format!("{session}/content"),
        Some(&token),
        Some(json!({ "content": "# North Star\n\nFreedom." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["hasUnsavedChanges"], true);

    let (status, saved) = send(&app, Method::POST, &format!("{session}/save"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["hasUnsavedChanges"], false);
    assert!(saved["lastSavedAt"].is_string());

    let (_, doc) = send(&app, Method::GET, &format!("/api/v1/documents/{id}"), Some(&token), None).await;
    assert_eq!(doc["content"], "# North Star\n\nFreedom.");

    let (status, _) = send(&app, Method::DELETE, &session, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &session, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_insights_without_provider_is_soft_failure() {
    let app = app().await;
    let (token, _) = signup(&app, "insights@example.com").await;

    let (status, body) = send(&app, Method::POST, "/api/v1/insights", Some(&token), Some(json!({ "type": "reviews" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    send(&app, Method::POST, "/api/v1/reviews", Some(&token), Some(daily_review(&chrono::Utc::now().format("%Y-%m-%d").to_string()))).await;
    let (status, body) = send(&app, Method::POST, "/api/v1/insights", Some(&token), Some(json!({ "type": "reviews" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");

    // The rest of the app is unaffected.
    let (status, _) = send(&app, Method::GET, "/api/v1/reviews", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_search_and_export() {
    let app = app().await;
    let (token, _) = signup(&app, "search@example.com").await;
    send(&app, Method::POST, "/api/v1/reviews", Some(&token), Some(daily_review("2024-03-10"))).await;
    send(&app, Method::POST, "/api/v1/goals", Some(&token), Some(goal("Release cadence"))).await;

    let (status, found) = send(&app, Method::GET, "/api/v1/search?q=RELEASE", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = found["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["review", "goal"]);

    let (_, empty) = send(&app, Method::GET, "/api/v1/search?q=%20", Some(&token), None).await;
    assert!(empty["results"].as_array().unwrap().is_empty());

    let request = Request::builder()
        .uri("/api/v1/export")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"personal-os-export-"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let markdown = String::from_utf8(body.to_vec()).unwrap();
    assert!(markdown.contains("## Documents"));
    assert!(markdown.contains("### Release cadence (ONE_YEAR)"));
    assert!(markdown.contains("### DAILY Reviews"));
}
