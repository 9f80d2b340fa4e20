use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Retention class of an activity entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Account and deletion events, kept indefinitely.
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }

    /// Unrecognized values fall back to the default.
    pub fn parse(value: &str) -> Self {
        match value {
            "critical" => Severity::Critical,
            "noise" => Severity::Noise,
            _ => Severity::Important,
        }
    }
}

/// Entities whose mutations are written to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. "class" in "class.created".
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
