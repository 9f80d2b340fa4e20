use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, events, models, routes};

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::classes::list_classes,
        routes::classes::create_class,
        routes::classes::get_class,
        routes::classes::update_class,
        routes::classes::delete_class,
        routes::students::list_students,
        routes::students::create_student,
        routes::students::get_student,
        routes::students::update_student,
        routes::students::delete_student,
        routes::teachers::list_teachers,
        routes::teachers::create_teacher,
        routes::teachers::get_teacher,
        routes::teachers::update_teacher,
        routes::teachers::delete_teacher,
        routes::activity::list_activity
    ),
    components(
        schemas(
            authz::Role,
            authz::Principal,
            authz::DenialReason,
            events::Severity,
            models::Gender,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::class::Class,
            models::class::ClassDetail,
            models::class::Subject,
            models::class::ClassCreateRequest,
            models::class::ClassUpdateRequest,
            models::student::Student,
            models::student::BloodGroup,
            models::student::ParentInfo,
            models::student::StudentCreateRequest,
            models::student::StudentUpdateRequest,
            models::teacher::Teacher,
            models::teacher::ClassAssignment,
            models::teacher::TeacherCreateRequest,
            models::teacher::TeacherUpdateRequest,
            models::activity::ActivityEntry,
            routes::health::HealthResponse,
            routes::auth::MessageResponse
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Registration, login and the current principal"),
        (name = "Users", description = "Login accounts"),
        (name = "Classes", description = "Classes, sections and subjects"),
        (name = "Students", description = "Student profiles"),
        (name = "Teachers", description = "Teacher profiles"),
        (name = "Activity", description = "Hash-chained audit trail")
    )
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    ensure_security_components(&mut doc)?;
    ensure_servers(&mut doc, port);

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: &utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(doc)?);

    let json_route = get(move || {
        let doc_json = Arc::clone(&doc_json);
        async move { Json((*doc_json).clone()) }
    });

    Ok(Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

    let schemes = root
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("components must be an object"))?
        .entry("securitySchemes")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

    schemes.insert(
        "bearerAuth".to_string(),
        json!({
            "type": "http",
            "scheme": "bearer",
            "bearerFormat": "JWT"
        }),
    );

    Ok(())
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{port}");

    match doc.get_mut("servers") {
        Some(Value::Array(arr)) => {
            let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !has {
                arr.push(json!({ "url": server_url }));
            }
        }
        _ => {
            doc["servers"] = json!([{ "url": server_url }]);
        }
    }
}
