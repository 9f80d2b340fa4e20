use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{SqliteStore, Store};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{activity, auth, classes, health, students, teachers, users};

pub const DEFAULT_PORT: u16 = 8000;

/// Port to listen on, from the raw `APP_PORT` value. Unset or blank means
/// the default.
pub fn listen_port(raw: Option<&str>) -> Result<u16, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PORT),
        Some(value) => value
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| AppError::configuration(format!("APP_PORT must be a valid port, got {value:?}"))),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state and spawns the activity listener. Must be called
    /// from within a tokio runtime.
    pub fn new(store: Arc<dyn Store>, jwt: JwtConfig) -> Self {
        let (event_bus, rx) = init_event_bus();
        tokio::spawn(start_activity_listener(rx, store.clone()));

        Self {
            store,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    Ok(build_router(AppState::new(store, jwt_config)))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/:id", get(users::get_user).put(users::update_user).delete(users::delete_user));

    let class_routes = Router::new()
        .route("/", get(classes::list_classes).post(classes::create_class))
        .route(
            "/:id",
            get(classes::get_class).put(classes::update_class).delete(classes::delete_class),
        );

    let student_routes = Router::new()
        .route("/", get(students::list_students).post(students::create_student))
        .route(
            "/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        );

    let teacher_routes = Router::new()
        .route("/", get(teachers::list_teachers).post(teachers::create_teacher))
        .route(
            "/:id",
            get(teachers::get_teacher)
                .put(teachers::update_teacher)
                .delete(teachers::delete_teacher),
        );

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/activity", get(activity::list_activity))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/classes", class_routes)
        .nest("/students", student_routes)
        .nest("/teachers", teacher_routes);

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
