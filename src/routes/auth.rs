use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ApiJson;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest};
use crate::services::users;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = users::register(state.store.as_ref(), payload).await?;
    let token = state.jwt.encode(&user.principal())?;

    log_activity(&state.event_bus, "registered", Some(user.id), &user, None);
    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = users::authenticate(state.store.as_ref(), payload).await?;
    let token = state.jwt.encode(&user.principal())?;
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Resolved principal", body = Principal),
        (status = 401, description = "Missing or invalid credential")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(principal: Principal) -> Json<Principal> {
    Json(principal)
}

/// Tokens are stateless, so logging out only acknowledges the request.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn logout(_principal: Principal) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}
