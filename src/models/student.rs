use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Gender;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
    #[default]
    Unknown,
}

impl BloodGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
            BloodGroup::Unknown => "Unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            BloodGroup::APositive,
            BloodGroup::ANegative,
            BloodGroup::BPositive,
            BloodGroup::BNegative,
            BloodGroup::AbPositive,
            BloodGroup::AbNegative,
            BloodGroup::OPositive,
            BloodGroup::ONegative,
            BloodGroup::Unknown,
        ]
        .into_iter()
        .find(|group| group.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParentInfo {
    pub father_name: String,
    pub mother_name: String,
    pub parent_contact: String,
    pub parent_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: Uuid,
    /// The student's own login account.
    pub user_id: Uuid,
    pub roll_number: String,
    pub class_id: Uuid,
    pub section: String,
    pub admission_date: NaiveDate,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: BloodGroup,
    pub parent_info: ParentInfo,
    /// Parent accounts allowed to view this record.
    pub guardian_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl crate::events::Loggable for Student {
    fn entity_type() -> &'static str { "student" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbStudent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub roll_number: String,
    pub class_id: Uuid,
    pub section: String,
    pub admission_date: NaiveDate,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub blood_group: String,
    pub father_name: String,
    pub mother_name: String,
    pub parent_contact: String,
    pub parent_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbStudent {
    pub fn into_student(self, guardian_ids: Vec<Uuid>) -> Result<Student, AppError> {
        let gender = Gender::parse(&self.gender)
            .ok_or_else(|| AppError::internal(format!("stored student {}: bad gender {}", self.id, self.gender)))?;
        let blood_group = BloodGroup::parse(&self.blood_group).ok_or_else(|| {
            AppError::internal(format!("stored student {}: bad blood group {}", self.id, self.blood_group))
        })?;

        Ok(Student {
            id: self.id,
            user_id: self.user_id,
            roll_number: self.roll_number,
            class_id: self.class_id,
            section: self.section,
            admission_date: self.admission_date,
            date_of_birth: self.date_of_birth,
            gender,
            blood_group,
            parent_info: ParentInfo {
                father_name: self.father_name,
                mother_name: self.mother_name,
                parent_contact: self.parent_contact,
                parent_email: self.parent_email,
            },
            guardian_ids,
            created_at: self.created_at,
        })
    }
}

/// Creates the student's login account and profile together.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StudentCreateRequest {
    #[schema(example = "Tom Sawyer")]
    pub name: Option<String>,
    #[schema(example = "tom@school.test")]
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "R-042")]
    pub roll_number: Option<String>,
    pub class_id: Option<Uuid>,
    #[schema(example = "A")]
    pub section: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub parent_contact: Option<String>,
    pub parent_email: Option<String>,
    #[serde(default)]
    pub guardian_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StudentUpdateRequest {
    pub roll_number: Option<String>,
    pub class_id: Option<Uuid>,
    pub section: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub parent_contact: Option<String>,
    pub parent_email: Option<String>,
    /// Replaces the full guardian list when present.
    pub guardian_ids: Option<Vec<Uuid>>,
}
