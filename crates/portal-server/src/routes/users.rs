//! User, subscription and confirmation-code routes under `/api/v1/users`

use super::{json_body, no_content, respond, with_state};
use crate::error::ApiError;
use crate::state::AppState;
use portal_subscriptions::model::{
    to_confirmation_code_collection, to_confirmation_code_model, to_subscription_collection,
    to_subscription_model, to_user_model, user_path,
};
use portal_subscriptions::{SubscriptionCreate, SubscriptionError};
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::header::LOCATION;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    email: String,
    preferred_language: String,
}

#[derive(Debug, Deserialize)]
struct UpdateEmailRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailValidationRequest {
    confirmation_code: String,
}

/// User API routes
pub fn user_routes(state: AppState, body_limit: u64) -> BoxedFilter<(Response,)> {
    let create_user = warp::path!("api" / "v1" / "users")
        .and(warp::post())
        .and(json_body::<CreateUserRequest>(body_limit))
        .and(with_state(state.clone()))
        .and_then(create_user);

    let get_user = warp::path!("api" / "v1" / "users" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_user);

    let update_email = warp::path!("api" / "v1" / "users" / Uuid)
        .and(warp::patch())
        .and(json_body::<UpdateEmailRequest>(body_limit))
        .and(with_state(state.clone()))
        .and_then(update_email);

    let create_subscription = warp::path!("api" / "v1" / "users" / Uuid / "subscriptions")
        .and(warp::post())
        .and(json_body::<SubscriptionCreate>(body_limit))
        .and(with_state(state.clone()))
        .and_then(create_subscription);

    let list_subscriptions = warp::path!("api" / "v1" / "users" / Uuid / "subscriptions")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let get_subscription = warp::path!("api" / "v1" / "users" / Uuid / "subscriptions" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_subscription);

    let delete_subscription =
        warp::path!("api" / "v1" / "users" / Uuid / "subscriptions" / Uuid)
            .and(warp::delete())
            .and(with_state(state.clone()))
            .and_then(delete_subscription);

    let create_code = warp::path!("api" / "v1" / "users" / Uuid / "confirmation-codes")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(create_confirmation_code);

    let list_codes = warp::path!("api" / "v1" / "users" / Uuid / "confirmation-codes")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_confirmation_codes);

    let validate_email = warp::path!("api" / "v1" / "users" / Uuid / "email-validations")
        .and(warp::post())
        .and(json_body::<EmailValidationRequest>(body_limit))
        .and(with_state(state))
        .and_then(validate_email);

    create_user
        .or(get_user)
        .unify()
        .or(update_email)
        .unify()
        .or(create_subscription)
        .unify()
        .or(list_subscriptions)
        .unify()
        .or(get_subscription)
        .unify()
        .or(delete_subscription)
        .unify()
        .or(create_code)
        .unify()
        .or(list_codes)
        .unify()
        .or(validate_email)
        .unify()
        .boxed()
}

async fn create_user(request: CreateUserRequest, state: AppState) -> Result<Response, Infallible> {
    let created = state
        .users
        .create_user(&request.email, &request.preferred_language);
    Ok(match created {
        Ok(user) => reply::with_header(
            reply::with_status(reply::json(&to_user_model(&user)), StatusCode::CREATED),
            LOCATION,
            user_path(user.id),
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    })
}

async fn get_user(user_id: Uuid, state: AppState) -> Result<Response, Infallible> {
    let user = state
        .users
        .get_user_by_id(user_id)
        .map(|u| to_user_model(&u))
        .ok_or(SubscriptionError::UserNotFound(user_id));
    Ok(respond(user, StatusCode::OK))
}

async fn update_email(
    user_id: Uuid,
    request: UpdateEmailRequest,
    state: AppState,
) -> Result<Response, Infallible> {
    let user = state
        .users
        .update_email(user_id, &request.email)
        .map(|u| to_user_model(&u));
    Ok(respond(user, StatusCode::OK))
}

async fn create_subscription(
    user_id: Uuid,
    request: SubscriptionCreate,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(no_content(
        state
            .users
            .create_subscription_for_user(user_id, &request)
            .map(|_| ()),
    ))
}

async fn list_subscriptions(user_id: Uuid, state: AppState) -> Result<Response, Infallible> {
    let subscriptions = state
        .users
        .get_subscriptions_by_user_id(user_id)
        .map(|subs| to_subscription_collection(user_id, &subs));
    Ok(respond(subscriptions, StatusCode::OK))
}

async fn get_subscription(
    user_id: Uuid,
    subscription_id: Uuid,
    state: AppState,
) -> Result<Response, Infallible> {
    let subscription = state
        .users
        .get_subscription_by_id(user_id, subscription_id)
        .map(|s| to_subscription_model(user_id, &s));
    Ok(respond(subscription, StatusCode::OK))
}

async fn delete_subscription(
    user_id: Uuid,
    subscription_id: Uuid,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(no_content(
        state.users.delete_subscription(user_id, subscription_id),
    ))
}

async fn create_confirmation_code(user_id: Uuid, state: AppState) -> Result<Response, Infallible> {
    let code = state
        .users
        .create_confirmation_code(user_id)
        .await
        .map(|c| to_confirmation_code_model(user_id, &c));
    Ok(respond(code, StatusCode::CREATED))
}

async fn list_confirmation_codes(user_id: Uuid, state: AppState) -> Result<Response, Infallible> {
    let codes = state
        .users
        .get_confirmation_codes(user_id)
        .map(|codes| to_confirmation_code_collection(user_id, &codes));
    Ok(respond(codes, StatusCode::OK))
}

async fn validate_email(
    user_id: Uuid,
    request: EmailValidationRequest,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(no_content(
        state
            .users
            .verify_confirmation_code(user_id, &request.confirmation_code)
            .map(|_| ()),
    ))
}
