use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{self, Operation, Principal};
use crate::errors::AppResult;
use crate::models::activity::ActivityEntry;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Number of entries, newest first. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/activity",
    tag = "Activity",
    params(ActivityQuery),
    responses((status = 200, description = "Recent activity, newest first", body = [ActivityEntry])),
    security(("bearerAuth" = []))
)]
pub async fn list_activity(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    authz::check(&principal, Operation::ActivityList)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.store.list_activity(limit).await?))
}
