//! warp filters and handlers

mod apply;
mod users;

pub use apply::apply_routes;
pub use users::user_routes;

use crate::error::ApiError;
use crate::state::AppState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

/// Header carrying the anti-forgery token on wizard posts
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Every route, with JSON errors for unmatched requests
pub fn routes(
    state: AppState,
    body_limit: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    apply_routes(state.clone(), body_limit)
        .or(user_routes(state, body_limit))
        .unify()
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T>(limit: u64) -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(limit).and(warp::body::json())
}

fn respond<T, E>(result: Result<T, E>, status: StatusCode) -> Response
where
    T: Serialize,
    E: Into<ApiError>,
{
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(e) => e.into().into_response(),
    }
}

fn no_content<E: Into<ApiError>>(result: Result<(), E>) -> Response {
    match result {
        Ok(()) => reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response(),
        Err(e) => e.into().into_response(),
    }
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let api = if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "not_found", "no such resource")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "request body too large")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "expected application/json",
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "method not allowed")
    } else {
        tracing::error!(?err, "unhandled rejection");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
    };
    Ok(api.into_response())
}
