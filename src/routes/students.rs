use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Operation, Principal};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ApiJson;
use crate::models::student::{Student, StudentCreateRequest, StudentUpdateRequest};
use crate::services::students;

#[utoipa::path(
    get,
    path = "/api/students",
    tag = "Students",
    responses((status = 200, description = "List students", body = [Student])),
    security(("bearerAuth" = []))
)]
pub async fn list_students(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Student>>> {
    authz::check(&principal, Operation::StudentList)?;
    Ok(Json(students::list_students(state.store.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/students",
    tag = "Students",
    request_body = StudentCreateRequest,
    responses(
        (status = 201, description = "Student and account created", body = Student),
        (status = 400, description = "Invalid input, unknown references or duplicates")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_student(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<StudentCreateRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    authz::check(&principal, Operation::StudentCreate)?;
    let student = students::create_student(state.store.as_ref(), payload).await?;
    log_activity(&state.event_bus, "created", Some(principal.id), &student, None);
    Ok((StatusCode::CREATED, Json(student)))
}

/// Readable by admins, the student and the student's guardians.
#[utoipa::path(
    get,
    path = "/api/students/{id}",
    tag = "Students",
    params(("id" = Uuid, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student detail", body = Student),
        (status = 403, description = "Not the student or a guardian"),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_student(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Student>> {
    authz::check_resource(state.store.as_ref(), &principal, Operation::StudentRead, id).await?;
    Ok(Json(students::get_student(state.store.as_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/students/{id}",
    tag = "Students",
    params(("id" = Uuid, Path, description = "Student id")),
    request_body = StudentUpdateRequest,
    responses((status = 200, description = "Student updated", body = Student)),
    security(("bearerAuth" = []))
)]
pub async fn update_student(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<StudentUpdateRequest>,
) -> AppResult<Json<Student>> {
    authz::check(&principal, Operation::StudentUpdate)?;
    let change = students::update_student(state.store.as_ref(), id, payload).await?;
    log_activity(&state.event_bus, "updated", Some(principal.id), &change.after, Some(&change.before));
    Ok(Json(change.after))
}

#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    tag = "Students",
    params(("id" = Uuid, Path, description = "Student id")),
    responses((status = 204, description = "Student deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_student(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::check(&principal, Operation::StudentDelete)?;
    let student = students::delete_student(state.store.as_ref(), id).await?;
    log_activity(&state.event_bus, "deleted", Some(principal.id), &student, None);
    Ok(StatusCode::NO_CONTENT)
}
