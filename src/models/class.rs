use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{nullable, ListInput};

pub const DEFAULT_CAPACITY: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subject {
    #[schema(example = "Mathematics")]
    pub name: String,
    pub teacher_id: Option<Uuid>,
}

impl From<String> for Subject {
    fn from(name: String) -> Self {
        Subject { name, teacher_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub sections: Vec<String>,
    pub class_teacher_id: Option<Uuid>,
    pub subjects: Vec<Subject>,
    pub academic_year: String,
    pub capacity: i64,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for Class {
    fn entity_type() -> &'static str { "class" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbClass {
    pub id: Uuid,
    pub name: String,
    pub sections: Json<Vec<String>>,
    pub class_teacher_id: Option<Uuid>,
    pub subjects: Json<Vec<Subject>>,
    pub academic_year: String,
    pub capacity: i64,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbClass> for Class {
    fn from(db: DbClass) -> Self {
        Class {
            id: db.id,
            name: db.name,
            sections: db.sections.0,
            class_teacher_id: db.class_teacher_id,
            subjects: db.subjects.0,
            academic_year: db.academic_year,
            capacity: db.capacity,
            room: db.room,
            description: db.description,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Class detail with enrollment counts.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClassDetail {
    #[serde(flatten)]
    pub class: Class,
    pub students_count: i64,
    pub students_by_section: BTreeMap<String, i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClassCreateRequest {
    #[schema(example = "Grade 5")]
    pub name: Option<String>,
    /// Array or comma-separated string, e.g. "A, B".
    #[schema(value_type = Option<Vec<String>>)]
    pub sections: Option<ListInput<String>>,
    pub class_teacher_id: Option<Uuid>,
    /// Array or comma-separated subject names.
    #[schema(value_type = Option<Vec<Subject>>)]
    pub subjects: Option<ListInput<Subject>>,
    #[schema(example = "2026-2027")]
    pub academic_year: Option<String>,
    pub capacity: Option<i64>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClassUpdateRequest {
    pub name: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub sections: Option<ListInput<String>>,
    /// `null` removes the class teacher.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub class_teacher_id: Option<Option<Uuid>>,
    #[schema(value_type = Option<Vec<Subject>>)]
    pub subjects: Option<ListInput<Subject>>,
    pub academic_year: Option<String>,
    pub capacity: Option<i64>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
