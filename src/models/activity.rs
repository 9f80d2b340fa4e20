use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Severity;

/// One persisted, hash-chained activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    #[schema(example = "class.created")]
    pub event_name: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: Severity,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityEntry {
    pub id: Uuid,
    pub event_name: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
    pub payload: Json<Value>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

impl From<DbActivityEntry> for ActivityEntry {
    fn from(db: DbActivityEntry) -> Self {
        ActivityEntry {
            id: db.id,
            event_name: db.event_name,
            actor_id: db.actor_id,
            subject_id: db.subject_id,
            occurred_at: db.occurred_at,
            severity: Severity::parse(&db.severity),
            payload: db.payload.0,
            prev_hash: db.prev_hash,
            hash: db.hash,
        }
    }
}
