use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use std::sync::Arc;

use crate::db::Store;
use crate::models::activity::ActivityEntry;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub severity: Severity,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

#[derive(Debug, Clone, Serialize)]
struct ActivityPayload {
    #[serde(rename = "new")]
    current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    old: Option<Value>,
}

/// Publishes `<entity>.<action>` for a mutation. Delivery failures are ignored.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
) {
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
    };

    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        subject_id: Some(entity.subject_id()),
        severity: entity.severity_for_action(action),
        payload: serde_json::to_value(payload).unwrap_or_default(),
    };

    // no receivers is fine: the listener may not be running
    let _ = event_bus.send(event);
}

/// `sha256(prev_hash || payload)`, hex encoded.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Appends one event to the activity log, chained to the latest entry.
pub async fn record_event(store: &dyn Store, event: DomainEvent) -> crate::errors::AppResult<ActivityEntry> {
    let prev_hash = store.last_activity_hash().await?;
    let payload_str = serde_json::to_string(&event.payload).unwrap_or_default();
    let hash = chain_hash(prev_hash.as_deref(), &payload_str);

    let entry = ActivityEntry {
        id: event.id,
        event_name: event.name,
        actor_id: event.actor_id,
        subject_id: event.subject_id,
        occurred_at: event.occurred_at,
        severity: event.severity,
        payload: event.payload,
        prev_hash,
        hash,
    };

    store.append_activity(&entry).await?;
    Ok(entry)
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<DomainEvent>, store: Arc<dyn Store>) {
    tracing::info!("activity listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                let name = event.name.clone();
                if let Err(e) = record_event(store.as_ref(), event).await {
                    tracing::error!(event = %name, "failed to save activity log: {}", e);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
