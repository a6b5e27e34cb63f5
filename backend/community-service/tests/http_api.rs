//! Integration Tests: HTTP surface
//!
//! Drives the `/api/v1/community` routes through `JwtAuthMiddleware` with
//! RS256 tokens signed by the test key pair.

mod common;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::{keys, Harness};
use community_service::handlers;
use community_service::middleware::JwtAuthMiddleware;
use crypto_core::TokenIssuer;
use serde_json::{json, Value};
use uuid::Uuid;

const BASE: &str = "/api/v1/community";

/// Call the app and render either outcome as (status, JSON body). Middleware
/// rejections surface as service errors, so both paths are needed.
async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match app.call(req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(err) => {
            let res = err.error_response();
            let status = res.status();
            let body = actix_web::body::to_bytes(res.into_body())
                .await
                .unwrap_or_default();
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }
}

fn bearer(issuer: &TokenIssuer, identity: Uuid, role: &str) -> (&'static str, String) {
    let token = issuer.issue_access_token(identity, role).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! community_app {
    ($harness:expr, $verifier:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($harness.service.clone()))
                .app_data(web::Data::from($harness.hub.clone()))
                .service(
                    web::scope(BASE)
                        .wrap(JwtAuthMiddleware::new($verifier.clone()))
                        .configure(handlers::configure),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_requests_without_token_are_unauthenticated() {
    let h = Harness::new();
    let (_, verifier) = keys();
    let app = community_app!(h, verifier);

    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/feed"))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[actix_web::test]
async fn test_expired_and_garbled_tokens() {
    let h = Harness::new();
    let (issuer, verifier) = keys();
    let app = community_app!(h, verifier);

    let expired = issuer
        .issue_with_ttl(Uuid::new_v4(), "Student", chrono::Duration::hours(-2))
        .unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/feed"))
        .insert_header(("Authorization", format!("Bearer {expired}")))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "EXPIRED");

    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/feed"))
        .insert_header(bearer(&issuer, Uuid::new_v4(), "wizard"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_thread_lifecycle_over_http() {
    let h = Harness::new();
    let (issuer, verifier) = keys();
    let app = community_app!(h, verifier);

    let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts"))
        .insert_header(bearer(&issuer, u1, "student"))
        .set_json(json!({ "kind": "question", "body": "Is the gym open late?" }))
        .to_request();
    let (status, post) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["display_role"], "Student");
    let post_id = post["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts/{post_id}/children"))
        .insert_header(bearer(&issuer, u2, "Student"))
        .set_json(json!({ "body": "Until 10pm" }))
        .to_request();
    let (status, created) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = created["path"]["comment_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts/{post_id}/children/{comment_id}/replies"))
        .insert_header(bearer(&issuer, u3, "Student"))
        .set_json(json!({ "body": "Weekends too" }))
        .to_request();
    let (status, created) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["path"]["level"], "reply");
    let reply_id = created["path"]["reply_id"].as_str().unwrap().to_string();
    let reply_uri = format!("{BASE}/posts/{post_id}/children/{comment_id}/replies/{reply_id}");

    let req = test::TestRequest::put()
        .uri(&reply_uri)
        .insert_header(bearer(&issuer, u2, "Student"))
        .set_json(json!({ "body": "not mine to edit" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let req = test::TestRequest::put()
        .uri(&format!("{reply_uri}/like"))
        .insert_header(bearer(&issuer, u1, "Student"))
        .to_request();
    let (status, like) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(like["liked"], true);
    assert_eq!(like["like_count"], 1);

    let req = test::TestRequest::delete()
        .uri(&reply_uri)
        .insert_header(bearer(&issuer, u1, "Student"))
        .to_request();
    let (status, view) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["children"][0]["replies"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/children/mine"))
        .insert_header(bearer(&issuer, u2, "Student"))
        .to_request();
    let (status, listing) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/feed?limit=10"))
        .insert_header(bearer(&issuer, u3, "Student"))
        .to_request();
    let (status, feed) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["total_count"], 1);
    assert_eq!(feed["has_more"], false);
}

#[actix_web::test]
async fn test_validation_and_conflict_statuses() {
    let h = Harness::new();
    let (issuer, verifier) = keys();
    let app = community_app!(h, verifier);
    let author = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts"))
        .insert_header(bearer(&issuer, author, "Student"))
        .set_json(json!({ "kind": "question", "body": "" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "body");

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts"))
        .insert_header(bearer(&issuer, author, "Student"))
        .set_json(json!({ "kind": "question", "body": "Version me" }))
        .to_request();
    let (_, post) = send(&app, req).await;
    let post_id = post["id"].as_str().unwrap().to_string();
    let version = post["version"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("{BASE}/posts/{post_id}"))
        .insert_header(bearer(&issuer, author, "Student"))
        .set_json(json!({ "body": "Edited", "expected_version": version }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("{BASE}/posts/{post_id}?expected_version={version}"))
        .insert_header(bearer(&issuer, author, "Student"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["retryable"], true);

    let req = test::TestRequest::delete()
        .uri(&format!("{BASE}/posts/{post_id}"))
        .insert_header(bearer(&issuer, author, "Student"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("{BASE}/posts/{post_id}"))
        .insert_header(bearer(&issuer, author, "Student"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[actix_web::test]
async fn test_poll_vote_over_http() {
    let h = Harness::new();
    let (issuer, verifier) = keys();
    let app = community_app!(h, verifier);

    let req = test::TestRequest::post()
        .uri(&format!("{BASE}/posts"))
        .insert_header(bearer(&issuer, Uuid::new_v4(), "club head"))
        .set_json(json!({
            "kind": "announcement",
            "title": "Lunch",
            "body": "Where should we go?",
            "poll_options": ["Tacos", "Ramen"],
        }))
        .to_request();
    let (status, post) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["category"], "poll");
    let post_id = post["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("{BASE}/posts/{post_id}/vote"))
        .insert_header(bearer(&issuer, Uuid::new_v4(), "Student"))
        .set_json(json!({ "option_index": 1 }))
        .to_request();
    let (status, view) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["poll_options"][1]["vote_count"], 1);
}
