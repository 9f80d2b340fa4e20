use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Operation, Principal};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ApiJson;
use crate::models::teacher::{Teacher, TeacherCreateRequest, TeacherUpdateRequest};
use crate::services::teachers;

#[utoipa::path(
    get,
    path = "/api/teachers",
    tag = "Teachers",
    responses((status = 200, description = "List teachers", body = [Teacher])),
    security(("bearerAuth" = []))
)]
pub async fn list_teachers(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Teacher>>> {
    authz::check(&principal, Operation::TeacherList)?;
    Ok(Json(teachers::list_teachers(state.store.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/teachers",
    tag = "Teachers",
    request_body = TeacherCreateRequest,
    responses(
        (status = 201, description = "Teacher and account created", body = Teacher),
        (status = 400, description = "Invalid input, unknown classes or duplicates")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_teacher(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<TeacherCreateRequest>,
) -> AppResult<(StatusCode, Json<Teacher>)> {
    authz::check(&principal, Operation::TeacherCreate)?;
    let teacher = teachers::create_teacher(state.store.as_ref(), payload).await?;
    log_activity(&state.event_bus, "created", Some(principal.id), &teacher, None);
    Ok((StatusCode::CREATED, Json(teacher)))
}

#[utoipa::path(
    get,
    path = "/api/teachers/{id}",
    tag = "Teachers",
    params(("id" = Uuid, Path, description = "Teacher id")),
    responses(
        (status = 200, description = "Teacher detail", body = Teacher),
        (status = 403, description = "Not the teacher"),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_teacher(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Teacher>> {
    authz::check_resource(state.store.as_ref(), &principal, Operation::TeacherRead, id).await?;
    Ok(Json(teachers::get_teacher(state.store.as_ref(), id).await?))
}

/// Admins may edit any profile; teachers only their own.
#[utoipa::path(
    put,
    path = "/api/teachers/{id}",
    tag = "Teachers",
    params(("id" = Uuid, Path, description = "Teacher id")),
    request_body = TeacherUpdateRequest,
    responses(
        (status = 200, description = "Teacher updated", body = Teacher),
        (status = 403, description = "Role not permitted or not the teacher")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_teacher(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<TeacherUpdateRequest>,
) -> AppResult<Json<Teacher>> {
    authz::check_resource(state.store.as_ref(), &principal, Operation::TeacherUpdate, id).await?;
    let change = teachers::update_teacher(state.store.as_ref(), &principal, id, payload).await?;
    log_activity(&state.event_bus, "updated", Some(principal.id), &change.after, Some(&change.before));
    Ok(Json(change.after))
}

#[utoipa::path(
    delete,
    path = "/api/teachers/{id}",
    tag = "Teachers",
    params(("id" = Uuid, Path, description = "Teacher id")),
    responses((status = 204, description = "Teacher deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_teacher(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::check(&principal, Operation::TeacherDelete)?;
    let teacher = teachers::delete_teacher(state.store.as_ref(), id).await?;
    log_activity(&state.event_bus, "deleted", Some(principal.id), &teacher, None);
    Ok(StatusCode::NO_CONTENT)
}
