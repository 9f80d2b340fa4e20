use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{nullable, Gender};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassAssignment {
    pub class_id: Uuid,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Teacher {
    pub id: Uuid,
    /// The teacher's own login account.
    pub user_id: Uuid,
    pub employee_id: String,
    pub qualification: String,
    pub experience: i64,
    pub subjects: Vec<String>,
    pub classes: Vec<ClassAssignment>,
    pub joining_date: NaiveDate,
    pub salary: f64,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
}

impl crate::events::Loggable for Teacher {
    fn entity_type() -> &'static str { "teacher" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTeacher {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_id: String,
    pub qualification: String,
    pub experience: i64,
    pub subjects: Json<Vec<String>>,
    pub classes: Json<Vec<ClassAssignment>>,
    pub joining_date: NaiveDate,
    pub salary: f64,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbTeacher> for Teacher {
    type Error = AppError;

    fn try_from(db: DbTeacher) -> Result<Self, Self::Error> {
        let gender = match db.gender.as_deref() {
            Some(raw) => Some(
                Gender::parse(raw)
                    .ok_or_else(|| AppError::internal(format!("stored teacher {}: bad gender {raw}", db.id)))?,
            ),
            None => None,
        };

        Ok(Teacher {
            id: db.id,
            user_id: db.user_id,
            employee_id: db.employee_id,
            qualification: db.qualification,
            experience: db.experience,
            subjects: db.subjects.0,
            classes: db.classes.0,
            joining_date: db.joining_date,
            salary: db.salary,
            date_of_birth: db.date_of_birth,
            gender,
            created_at: db.created_at,
        })
    }
}

/// Creates the teacher's login account and profile together.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TeacherCreateRequest {
    #[schema(example = "Anne Sullivan")]
    pub name: Option<String>,
    #[schema(example = "anne@school.test")]
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "EMP-007")]
    pub employee_id: Option<String>,
    #[schema(example = "M.Ed")]
    pub qualification: Option<String>,
    pub experience: Option<i64>,
    pub subjects: Option<Vec<String>>,
    #[serde(default)]
    pub classes: Vec<ClassAssignment>,
    pub joining_date: Option<NaiveDate>,
    pub salary: Option<f64>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TeacherUpdateRequest {
    pub employee_id: Option<String>,
    pub qualification: Option<String>,
    pub experience: Option<i64>,
    pub subjects: Option<Vec<String>>,
    pub classes: Option<Vec<ClassAssignment>>,
    pub joining_date: Option<NaiveDate>,
    pub salary: Option<f64>,
    /// `null` clears the stored date.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub date_of_birth: Option<Option<NaiveDate>>,
    /// `null` clears the stored gender.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Gender>)]
    pub gender: Option<Option<Gender>>,
}
