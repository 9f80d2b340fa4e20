use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Operation, Principal};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ApiJson;
use crate::models::user::{User, UserCreateRequest, UserUpdateRequest};
use crate::services::users;

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses((status = 200, description = "All accounts", body = [User])),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<User>>> {
    authz::check(&principal, Operation::UserList)?;
    Ok(Json(users::list_users(state.store.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses((status = 201, description = "Account created", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    authz::check(&principal, Operation::UserCreate)?;
    let user = users::create_user(state.store.as_ref(), payload).await?;
    log_activity(&state.event_bus, "created", Some(principal.id), &user, None);
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Account detail", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    authz::check_resource(state.store.as_ref(), &principal, Operation::UserRead, id).await?;
    Ok(Json(users::get_user(state.store.as_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "Account updated", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    authz::check_resource(state.store.as_ref(), &principal, Operation::UserUpdate, id).await?;
    let change = users::update_user(state.store.as_ref(), &principal, id, payload).await?;
    log_activity(&state.event_bus, "updated", Some(principal.id), &change.after, Some(&change.before));
    Ok(Json(change.after))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Account still backs a profile")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::check(&principal, Operation::UserDelete)?;
    let user = users::delete_user(state.store.as_ref(), id).await?;
    log_activity(&state.event_bus, "deleted", Some(principal.id), &user, None);
    Ok(StatusCode::NO_CONTENT)
}
