use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Operation, Principal};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ApiJson;
use crate::models::class::{Class, ClassCreateRequest, ClassDetail, ClassUpdateRequest};
use crate::services::classes;

#[utoipa::path(
    get,
    path = "/api/classes",
    tag = "Classes",
    responses((status = 200, description = "List classes", body = [Class])),
    security(("bearerAuth" = []))
)]
pub async fn list_classes(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Class>>> {
    authz::check(&principal, Operation::ClassList)?;
    Ok(Json(classes::list_classes(state.store.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/classes",
    tag = "Classes",
    request_body = ClassCreateRequest,
    responses(
        (status = 201, description = "Class created", body = Class),
        (status = 400, description = "Missing or invalid fields")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_class(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<ClassCreateRequest>,
) -> AppResult<(StatusCode, Json<Class>)> {
    authz::check(&principal, Operation::ClassCreate)?;
    let class = classes::create_class(state.store.as_ref(), payload).await?;
    log_activity(&state.event_bus, "created", Some(principal.id), &class, None);
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    get,
    path = "/api/classes/{id}",
    tag = "Classes",
    params(("id" = Uuid, Path, description = "Class id")),
    responses((status = 200, description = "Class with enrollment counts", body = ClassDetail)),
    security(("bearerAuth" = []))
)]
pub async fn get_class(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClassDetail>> {
    authz::check(&principal, Operation::ClassRead)?;
    Ok(Json(classes::get_class(state.store.as_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/classes/{id}",
    tag = "Classes",
    params(("id" = Uuid, Path, description = "Class id")),
    request_body = ClassUpdateRequest,
    responses((status = 200, description = "Class updated", body = Class)),
    security(("bearerAuth" = []))
)]
pub async fn update_class(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ClassUpdateRequest>,
) -> AppResult<Json<Class>> {
    authz::check(&principal, Operation::ClassUpdate)?;
    let change = classes::update_class(state.store.as_ref(), id, payload).await?;
    log_activity(&state.event_bus, "updated", Some(principal.id), &change.after, Some(&change.before));
    Ok(Json(change.after))
}

#[utoipa::path(
    delete,
    path = "/api/classes/{id}",
    tag = "Classes",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 400, description = "Students are still enrolled")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_class(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::check(&principal, Operation::ClassDelete)?;
    let class = classes::delete_class(state.store.as_ref(), id).await?;
    log_activity(&state.event_bus, "deleted", Some(principal.id), &class, None);
    Ok(StatusCode::NO_CONTENT)
}
