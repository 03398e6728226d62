//! Apply wizard routes under `/apply/{session}`

use super::{json_body, no_content, respond, with_state, CSRF_HEADER};
use crate::error::ApiError;
use crate::state::AppState;
use portal_session::SessionId;
use portal_wizard::{ApplicationType, Navigation, Step, WizardError};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use warp::filters::BoxedFilter;
use warp::http::header::LOCATION;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    captcha_token: String,
}

#[derive(Debug, Serialize)]
struct CsrfResponse {
    csrf_token: String,
}

/// Wizard routes
pub fn apply_routes(state: AppState, body_limit: u64) -> BoxedFilter<(Response,)> {
    let csrf = warp::header::optional::<String>(CSRF_HEADER).map(Option::unwrap_or_default);

    let begin = warp::path!("apply" / SessionId / ApplicationType)
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(begin);

    let token = warp::path!("apply" / SessionId / "csrf")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(token);

    let abandon = warp::path!("apply" / SessionId)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(abandon);

    let confirm = warp::path!("apply" / SessionId / ApplicationType / "submit")
        .and(warp::post())
        .and(csrf.clone())
        .and(warp::addr::remote())
        .and(json_body::<ConfirmRequest>(body_limit))
        .and(with_state(state.clone()))
        .and_then(confirm);

    let back = warp::path!("apply" / SessionId / ApplicationType / Step / "back")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(back);

    let enter = warp::path!("apply" / SessionId / ApplicationType / Step)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(enter);

    let submit_step = warp::path!("apply" / SessionId / ApplicationType / Step)
        .and(warp::post())
        .and(csrf)
        .and(json_body::<serde_json::Value>(body_limit))
        .and(with_state(state))
        .and_then(submit_step);

    begin
        .or(token)
        .unify()
        .or(abandon)
        .unify()
        .or(confirm)
        .unify()
        .or(back)
        .unify()
        .or(enter)
        .unify()
        .or(submit_step)
        .unify()
        .boxed()
}

fn step_path(session: &SessionId, application_type: ApplicationType, step: Step) -> String {
    format!("/apply/{session}/{application_type}/{step}")
}

fn see_other(session: &SessionId, application_type: ApplicationType, step: Step) -> Response {
    let body = reply::json(&Navigation::Redirect { to: step });
    reply::with_header(
        reply::with_status(body, StatusCode::SEE_OTHER),
        LOCATION,
        step_path(session, application_type, step),
    )
    .into_response()
}

fn navigation(session: &SessionId, application_type: ApplicationType, nav: &Navigation) -> Response {
    match nav {
        Navigation::Render(view) => reply::json(view).into_response(),
        Navigation::Redirect { to } => see_other(session, application_type, *to),
    }
}

/// Missing or mismatched state sends the client back to the first step, an
/// unreachable review page to wherever the saved answers lead
fn wizard_error(
    state: &AppState,
    session: &SessionId,
    application_type: ApplicationType,
    err: WizardError,
) -> Response {
    match err {
        WizardError::NotFound { .. } => {
            if let Ok(registry) = state.engine.registry(application_type) {
                return see_other(session, application_type, registry.first_step());
            }
            ApiError::from(err).into_response()
        }
        WizardError::ReviewUnavailable { redirect } => {
            see_other(session, application_type, redirect)
        }
        err => ApiError::from(err).into_response(),
    }
}

async fn begin(
    session: SessionId,
    application_type: ApplicationType,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(respond(
        state.engine.begin(&session, application_type).await,
        StatusCode::CREATED,
    ))
}

async fn token(session: SessionId, state: AppState) -> Result<Response, Infallible> {
    let issued = state
        .engine
        .tokens()
        .issue(&session)
        .await
        .map(|csrf_token| CsrfResponse { csrf_token });
    Ok(respond(issued, StatusCode::OK))
}

async fn abandon(session: SessionId, state: AppState) -> Result<Response, Infallible> {
    Ok(no_content(state.engine.abandon(&session).await))
}

async fn enter(
    session: SessionId,
    application_type: ApplicationType,
    step: Step,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(match state.engine.enter(&session, application_type, step).await {
        Ok(nav) => navigation(&session, application_type, &nav),
        Err(e) => wizard_error(&state, &session, application_type, e),
    })
}

async fn back(
    session: SessionId,
    application_type: ApplicationType,
    step: Step,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(match state.engine.back(&session, application_type, step).await {
        Ok(to) => see_other(&session, application_type, to),
        Err(e) => wizard_error(&state, &session, application_type, e),
    })
}

async fn submit_step(
    session: SessionId,
    application_type: ApplicationType,
    step: Step,
    csrf_token: String,
    data: serde_json::Value,
    state: AppState,
) -> Result<Response, Infallible> {
    let result = state
        .engine
        .submit_step(&session, application_type, step, data, &csrf_token)
        .await;
    Ok(match result {
        Ok(nav) => navigation(&session, application_type, &nav),
        Err(e) => wizard_error(&state, &session, application_type, e),
    })
}

async fn confirm(
    session: SessionId,
    application_type: ApplicationType,
    csrf_token: String,
    remote: Option<SocketAddr>,
    request: ConfirmRequest,
    state: AppState,
) -> Result<Response, Infallible> {
    let result = state
        .engine
        .confirm(
            &session,
            application_type,
            &csrf_token,
            &request.captcha_token,
            remote.map(|addr| addr.ip()),
        )
        .await;
    Ok(match result {
        Ok(info) => reply::json(&info).into_response(),
        Err(e) => wizard_error(&state, &session, application_type, e),
    })
}
