mod common;

use axum::http::{Method, StatusCode};
use brand_auth_service::services::SessionRole;
use chrono::Duration;
use common::{TestApp, ADMIN_EMAIL, BRAND_EMAIL};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

#[tokio::test]
async fn admin_routes_reject_anonymous_callers() {
    let app = TestApp::spawn().await;

    let res = app.get("/admin/brands", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "unauthorized");
    assert_eq!(res.body["message"], "Unauthorized");
}

#[tokio::test]
async fn admin_routes_reject_non_admins_and_emailless_sessions() {
    let app = TestApp::spawn().await;

    let user = app.token(Some("someone@platform.test"), SessionRole::User);
    let brand = app.token(Some(BRAND_EMAIL), SessionRole::Brand);
    let no_email = app.token(None, SessionRole::User);

    for token in [&user, &brand, &no_email] {
        let res = app.get("/admin/brands", Some(token)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["message"], "Unauthorized");
    }
}

#[tokio::test]
async fn tokens_with_foreign_signature_are_ignored() {
    let app = TestApp::spawn().await;
    let forged = encode(
        &Header::default(),
        &json!({ "sub": ADMIN_EMAIL, "email": ADMIN_EMAIL, "exp": 4102444800i64, "iat": 0, "jti": "x" }),
        &EncodingKey::from_secret(b"not-the-session-secret"),
    )
    .unwrap();

    let res = app.get("/admin/brands", Some(&forged)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn allow_list_match_ignores_case() {
    let app = TestApp::spawn().await;
    let token = app.token(Some("Admin@Platform.TEST"), SessionRole::User);

    let res = app.get("/admin/brands", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["brands"].as_array().unwrap().len(), 2);

    let me = app.get("/auth/session", Some(&token)).await;
    assert_eq!(me.body["is_admin"], true);
}

#[tokio::test]
async fn session_endpoint_requires_a_token() {
    let app = TestApp::spawn().await;
    let res = app.get("/auth/session", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_manages_brand_accounts() {
    let app = TestApp::spawn().await;
    let token = app.admin_token();

    let created = app
        .post(
            "/admin/brands",
            json!({ "email": "Hello@Bakery.test", "slug": "bakery", "display_name": "Bakery" }),
            Some(&token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["email"], "hello@bakery.test");
    assert_eq!(created.body["active"], true);

    let duplicate = app
        .post(
            "/admin/brands",
            json!({ "email": "other@bakery.test", "slug": "bakery", "display_name": "Bakery 2" }),
            Some(&token),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["error"], "conflict");

    let invalid = app
        .post(
            "/admin/brands",
            json!({ "email": "x@y.test", "slug": "Not A Slug", "display_name": "X" }),
            Some(&token),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let missing = app
        .send(
            Method::PATCH,
            "/admin/brands/unknown",
            Some(json!({ "active": false })),
            Some(&token),
            &[],
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let suspended = app
        .send(
            Method::PATCH,
            "/admin/brands/bakery",
            Some(json!({ "active": false })),
            Some(&token),
            &[],
        )
        .await;
    assert_eq!(suspended.status, StatusCode::OK);
    assert_eq!(suspended.body["active"], false);

    let res = app.request_code("hello@bakery.test").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn admin_purges_expired_codes() {
    let app = TestApp::spawn().await;
    let token = app.admin_token();

    app.request_code(BRAND_EMAIL).await;
    assert_eq!(app.store.otp_records().len(), 1);

    let nothing = app
        .send(Method::POST, "/admin/otp/purge", None, Some(&token), &[])
        .await;
    assert_eq!(nothing.status, StatusCode::OK);
    assert_eq!(nothing.body["purged"], 0);

    app.clock.advance(Duration::minutes(10));
    let purged = app
        .send(Method::POST, "/admin/otp/purge", None, Some(&token), &[])
        .await;
    assert_eq!(purged.body["purged"], 1);
    assert!(app.store.otp_records().is_empty());

    let anonymous = app
        .send(Method::POST, "/admin/otp/purge", None, None, &[])
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}
