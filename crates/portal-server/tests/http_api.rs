//! HTTP surface driven through `warp::test`

use portal_server::{routes, AppState, CSRF_HEADER};
use portal_session::SessionId;
use portal_test_utils::{
    fixtures, payload_json, seed_complete_state, setup_test_engine, setup_test_engine_with,
    setup_test_user_service, RecordingSubmissionService, TestEngine,
};
use portal_wizard::{ApplicationType, Step, SubmissionError, WizardConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::http::Response;

const LIMIT: u64 = 64 * 1024;

fn app(t: &TestEngine) -> AppState {
    let (users, _) = setup_test_user_service();
    AppState::new(t.engine.clone(), Arc::new(users))
}

fn body(res: &Response<Bytes>) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

fn location(res: &Response<Bytes>) -> &str {
    res.headers()["location"].to_str().unwrap()
}

async fn begin(state: &AppState, session: &SessionId, ty: &str) -> String {
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/{ty}"))
        .reply(&routes(state.clone(), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body(&res)["csrf_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn begin_then_skip_ahead_redirects() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    begin(&state, &session, "adult").await;

    let res = warp::test::request()
        .path(&format!("/apply/{session}/adult/contact-information"))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        format!("/apply/{session}/adult/terms-and-conditions")
    );
}

#[tokio::test]
async fn first_step_renders_for_new_session() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();

    let res = warp::test::request()
        .path(&format!("/apply/{session}/adult/terms-and-conditions"))
        .reply(&routes(state.clone(), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["step"], "terms-and-conditions");

    let res = warp::test::request()
        .path(&format!("/apply/{session}/adult/tax-filing"))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        format!("/apply/{session}/adult/terms-and-conditions")
    );
}

#[tokio::test]
async fn step_post_requires_token() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;
    let terms = payload_json(&fixtures::terms());

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/terms-and-conditions"))
        .json(&terms)
        .reply(&routes(state.clone(), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&res)["error"], "security_token_mismatch");

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/terms-and-conditions"))
        .header(CSRF_HEADER, &csrf)
        .json(&terms)
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/apply/{session}/adult/tax-filing"));
}

#[tokio::test]
async fn invalid_payload_returns_field_errors() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/terms-and-conditions"))
        .header(CSRF_HEADER, &csrf)
        .json(&json!({
            "acknowledge_terms": false,
            "acknowledge_privacy": true,
            "share_data": true
        }))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body(&res);
    assert_eq!(body["error"], "validation_failed");
    assert!(body["fields"]["acknowledge_terms"].is_array());
}

#[tokio::test]
async fn unknown_step_is_not_found() {
    let t = setup_test_engine();
    let res = warp::test::request()
        .path(&format!("/apply/{}/adult/favourite-colour", SessionId::generate()))
        .reply(&routes(app(&t), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res)["error"], "not_found");
}

#[tokio::test]
async fn other_flow_state_redirects_to_its_start() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/child/terms-and-conditions"))
        .header(CSRF_HEADER, &csrf)
        .json(&payload_json(&fixtures::terms()))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        format!("/apply/{session}/child/terms-and-conditions")
    );
}

#[tokio::test]
async fn confirm_returns_confirmation_code() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;
    seed_complete_state(&t.engine, &session, ApplicationType::Adult)
        .await
        .unwrap();

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/submit"))
        .header(CSRF_HEADER, &csrf)
        .json(&json!({ "captcha_token": "human" }))
        .reply(&routes(state.clone(), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["confirmation_code"], "ABC123");

    let res = warp::test::request()
        .path(&format!("/apply/{session}/adult/review-information"))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/apply/{session}/adult/confirmation"));
}

#[tokio::test]
async fn confirm_with_unfiled_taxes_redirects() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;
    seed_complete_state(&t.engine, &session, ApplicationType::Adult)
        .await
        .unwrap();
    t.engine
        .repository()
        .update(&session, ApplicationType::Adult, |s| {
            s.fields.insert(Step::TaxFiling, fixtures::tax_filing(false));
            Ok(())
        })
        .await
        .unwrap();

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/submit"))
        .header(CSRF_HEADER, &csrf)
        .json(&json!({ "captcha_token": "human" }))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/apply/{session}/adult/file-your-taxes"));
    assert_eq!(t.service.calls(), 0);
}

#[tokio::test]
async fn submission_outage_is_retryable_503() {
    let t = setup_test_engine_with(
        RecordingSubmissionService::failing(SubmissionError::Transport("timed out".into())),
        WizardConfig::new(),
    );
    let state = app(&t);
    let session = SessionId::generate();
    let csrf = begin(&state, &session, "adult").await;
    seed_complete_state(&t.engine, &session, ApplicationType::Adult)
        .await
        .unwrap();

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/apply/{session}/adult/submit"))
        .header(CSRF_HEADER, &csrf)
        .json(&json!({ "captcha_token": "human" }))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body(&res)["retryable"], true);
}

#[tokio::test]
async fn abandon_then_enter_starts_over() {
    let t = setup_test_engine();
    let state = app(&t);
    let session = SessionId::generate();
    begin(&state, &session, "adult").await;

    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/apply/{session}"))
        .reply(&routes(state.clone(), LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = warp::test::request()
        .path(&format!("/apply/{session}/adult/tax-filing/back"))
        .reply(&routes(state, LIMIT))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        format!("/apply/{session}/adult/terms-and-conditions")
    );
}

#[tokio::test]
async fn subscription_lifecycle() {
    let t = setup_test_engine();
    let state = app(&t);
    let filter = routes(state, LIMIT);

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/users")
        .json(&json!({ "email": "applicant@example.ca", "preferredLanguage": "en" }))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let user = body(&res);
    let id = user["id"].as_str().unwrap().to_string();
    assert_eq!(user["_links"]["self"]["href"], format!("/api/v1/users/{id}"));

    let subscribe = || {
        warp::test::request()
            .method("POST")
            .path(&format!("/api/v1/users/{id}/subscriptions"))
            .json(&json!({ "alertTypeCode": "application-status" }))
    };
    assert_eq!(subscribe().reply(&filter).await.status(), StatusCode::NO_CONTENT);
    let res = subscribe().reply(&filter).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = warp::test::request()
        .path(&format!("/api/v1/users/{id}/subscriptions"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let items = body(&res)["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["alertTypeCode"], "application-status");

    let res = warp::test::request()
        .path(&format!("/api/v1/users/{}/subscriptions", uuid::Uuid::new_v4()))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn email_validation_with_wrong_code_is_rejected() {
    let t = setup_test_engine();
    let (users, email) = setup_test_user_service();
    let filter = routes(AppState::new(t.engine.clone(), Arc::new(users)), LIMIT);

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/users")
        .json(&json!({ "email": "applicant@example.ca", "preferredLanguage": "fr" }))
        .reply(&filter)
        .await;
    let id = body(&res)["id"].as_str().unwrap().to_string();

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/api/v1/users/{id}/confirmation-codes"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let sent = email.last_code_for("applicant@example.ca").unwrap();
    let wrong: String = sent
        .chars()
        .map(|c| if c == '9' { '0' } else { '9' })
        .collect();

    let validate = |code: &str| {
        warp::test::request()
            .method("POST")
            .path(&format!("/api/v1/users/{id}/email-validations"))
            .json(&json!({ "confirmationCode": code }))
    };
    let res = validate(&wrong).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&res)["error"], "code_mismatch");

    let res = validate(&sent).reply(&filter).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = warp::test::request()
        .path(&format!("/api/v1/users/{id}"))
        .reply(&filter)
        .await;
    assert_eq!(body(&res)["emailVerified"], true);
}
