use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, CheckEmailQuery, CheckEmailResponse, LoginRequest,
            LoginResponse, MessageResponse, PublicUser, SignupRequest,
        },
        extractors::AuthUser,
    },
    state::AppState,
};

const UNAUTHENTICATED: &str = "Unauthenticated user.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/check-email", get(check_email))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_me))
        .route("/user/password", put(change_password))
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(MessageResponse::new(UNAUTHENTICATED)),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(MessageResponse::new(message))).into_response()
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Response> {
    let Json(payload) = payload.map_err(|e| bad_request(e.body_text()))?;
    state
        .auth
        .signup(&payload.email, &payload.password, &payload.name)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(MessageResponse::new("Signup completed.")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, Response> {
    let Json(payload) = payload.map_err(|e| bad_request(e.body_text()))?;
    let (token, user) = state
        .auth
        .login(&payload.email, &payload.password)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn check_email(
    State(state): State<AppState>,
    query: Result<Query<CheckEmailQuery>, QueryRejection>,
) -> Result<Json<CheckEmailResponse>, Response> {
    let Query(q) = query.map_err(|e| bad_request(e.body_text()))?;
    let available = state
        .auth
        .is_email_available(&q.email)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(CheckEmailResponse { available }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    principal: Option<AuthUser>,
) -> Result<Json<PublicUser>, Response> {
    let Some(AuthUser(email)) = principal else {
        return Err(unauthenticated());
    };
    let user = state
        .auth
        .get_user(&email)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    principal: Option<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Response> {
    let Some(AuthUser(email)) = principal else {
        warn!("password change without principal");
        return Err(unauthenticated());
    };
    let Json(payload) = payload.map_err(|e| bad_request(e.body_text()))?;
    let current = payload
        .current_password
        .ok_or_else(|| bad_request("currentPassword is required."))?;
    let new = payload
        .new_password
        .ok_or_else(|| bad_request("newPassword is required."))?;

    state
        .auth
        .change_password(&email, &current, &new)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(MessageResponse::new("Password changed successfully.")))
}
