use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::Store;
use crate::authz::{ResourceRef, ResourceType};
use crate::errors::{AppError, AppResult};
use crate::models::activity::{ActivityEntry, DbActivityEntry};
use crate::models::class::{Class, DbClass};
use crate::models::student::{DbStudent, Student};
use crate::models::teacher::{DbTeacher, Teacher};
use crate::models::user::{DbUser, User};

const USER_COLUMNS: &str = "id, name, email, role, phone, address, password_hash, created_at, updated_at";
const CLASS_COLUMNS: &str = "id, name, sections, class_teacher_id, subjects, academic_year, capacity, room, description, is_active, created_at, updated_at";
const STUDENT_COLUMNS: &str = "id, user_id, roll_number, class_id, section, admission_date, date_of_birth, gender, blood_group, father_name, mother_name, parent_contact, parent_email, created_at";
const TEACHER_COLUMNS: &str = "id, user_id, employee_id, qualification, experience, subjects, classes, joining_date, salary, date_of_birth, gender, created_at";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn guardian_ids(&self, student_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT guardian_id FROM student_guardians WHERE student_id = ? ORDER BY guardian_id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// Translates constraint failures into domain errors.
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if db_err.is_unique_violation() {
            let reason = if message.contains("users.email") {
                "email already in use"
            } else if message.contains("students.roll_number") {
                "roll number already in use"
            } else if message.contains("teachers.employee_id") {
                "employee id already in use"
            } else if message.contains("user_id") {
                "account already has a profile"
            } else {
                "record already exists"
            };
            return AppError::conflict(reason);
        }
        if db_err.is_foreign_key_violation() {
            return AppError::conflict("operation would break a reference between records");
        }
    }
    AppError::Storage(err)
}

fn expect_one(rows: u64, what: &str) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::not_found(format!("{what} not found")));
    }
    Ok(())
}

async fn insert_user(tx: &mut Transaction<'_, Sqlite>, user: &User, password_hash: &str) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO users (id, name, email, role, phone, address, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.phone)
    .bind(&user.address)
    .bind(password_hash)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

async fn replace_guardians(tx: &mut Transaction<'_, Sqlite>, student: &Student) -> AppResult<()> {
    sqlx::query("DELETE FROM student_guardians WHERE student_id = ?")
        .bind(student.id)
        .execute(&mut **tx)
        .await?;

    for guardian_id in &student.guardian_ids {
        sqlx::query("INSERT INTO student_guardians (student_id, guardian_id) VALUES (?, ?)")
            .bind(student.id)
            .bind(guardian_id)
            .execute(&mut **tx)
            .await
            .map_err(map_write_error)?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn find_resource_ref(&self, resource_type: ResourceType, id: Uuid) -> AppResult<ResourceRef> {
        let resource = ResourceRef::new(resource_type, id);
        match resource_type {
            ResourceType::Student => {
                let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM students WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| AppError::not_found("student not found"))?;
                let guardians = self.guardian_ids(id).await?;
                Ok(resource.owned_by(owner).with_guardians(guardians))
            }
            ResourceType::Teacher => {
                let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM teachers WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| AppError::not_found("teacher not found"))?;
                Ok(resource.owned_by(owner))
            }
            ResourceType::User => {
                if !self.exists(ResourceType::User, id).await? {
                    return Err(AppError::not_found("user not found"));
                }
                Ok(resource.owned_by(id))
            }
            ResourceType::Class => {
                if !self.exists(ResourceType::Class, id).await? {
                    return Err(AppError::not_found("class not found"));
                }
                Ok(resource)
            }
        }
    }

    async fn exists(&self, resource_type: ResourceType, id: Uuid) -> AppResult<bool> {
        let sql = match resource_type {
            ResourceType::Student => "SELECT COUNT(1) FROM students WHERE id = ?",
            ResourceType::Teacher => "SELECT COUNT(1) FROM teachers WHERE id = ?",
            ResourceType::Class => "SELECT COUNT(1) FROM classes WHERE id = ?",
            ResourceType::User => "SELECT COUNT(1) FROM users WHERE id = ?",
        };
        let count: i64 = sqlx::query_scalar(sql).bind(id).fetch_one(&self.pool).await?;
        Ok(count > 0)
    }

    async fn create_user(&self, user: &User, password_hash: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, user, password_hash).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?
            .try_into()
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<(User, String)>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let Some(db_user) = sqlx::query_as::<_, DbUser>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let password_hash = db_user.password_hash.clone();
        Ok(Some((db_user.try_into()?, password_hash)))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
        sqlx::query_as::<_, DbUser>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_user(&self, user: &User, password_hash: Option<&str>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, role = ?, phone = ?, address = ?, password_hash = COALESCE(?, password_hash), updated_at = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.address)
        .bind(password_hash)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "user")
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "user")
    }

    async fn count_profiles(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(1) FROM students WHERE user_id = ?) + (SELECT COUNT(1) FROM teachers WHERE user_id = ?)",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_guardian_links(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM student_guardians WHERE guardian_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_class(&self, class: &Class) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO classes (id, name, sections, class_teacher_id, subjects, academic_year, capacity, room, description, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(class.id)
        .bind(&class.name)
        .bind(Json(&class.sections))
        .bind(class.class_teacher_id)
        .bind(Json(&class.subjects))
        .bind(&class.academic_year)
        .bind(class.capacity)
        .bind(&class.room)
        .bind(&class.description)
        .bind(class.is_active)
        .bind(class.created_at)
        .bind(class.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_class(&self, id: Uuid) -> AppResult<Class> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?");
        let class = sqlx::query_as::<_, DbClass>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("class not found"))?;
        Ok(class.into())
    }

    async fn list_classes(&self) -> AppResult<Vec<Class>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes ORDER BY created_at");
        let rows = sqlx::query_as::<_, DbClass>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Class::from).collect())
    }

    async fn update_class(&self, class: &Class) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE classes SET name = ?, sections = ?, class_teacher_id = ?, subjects = ?, academic_year = ?, capacity = ?, room = ?, description = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&class.name)
        .bind(Json(&class.sections))
        .bind(class.class_teacher_id)
        .bind(Json(&class.subjects))
        .bind(&class.academic_year)
        .bind(class.capacity)
        .bind(&class.room)
        .bind(&class.description)
        .bind(class.is_active)
        .bind(class.updated_at)
        .bind(class.id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "class")
    }

    async fn delete_class(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "class")
    }

    async fn count_students_in_class(&self, class_id: Uuid, section: Option<&str>) -> AppResult<i64> {
        let count: i64 = match section {
            Some(section) => {
                sqlx::query_scalar("SELECT COUNT(1) FROM students WHERE class_id = ? AND section = ?")
                    .bind(class_id)
                    .bind(section)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(1) FROM students WHERE class_id = ?")
                    .bind(class_id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn create_student(&self, account: &User, password_hash: &str, student: &Student) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, account, password_hash).await?;

        sqlx::query(
            "INSERT INTO students (id, user_id, roll_number, class_id, section, admission_date, date_of_birth, gender, blood_group, father_name, mother_name, parent_contact, parent_email, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(student.id)
        .bind(student.user_id)
        .bind(&student.roll_number)
        .bind(student.class_id)
        .bind(&student.section)
        .bind(student.admission_date)
        .bind(student.date_of_birth)
        .bind(student.gender.as_str())
        .bind(student.blood_group.as_str())
        .bind(&student.parent_info.father_name)
        .bind(&student.parent_info.mother_name)
        .bind(&student.parent_info.parent_contact)
        .bind(&student.parent_info.parent_email)
        .bind(student.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        replace_guardians(&mut tx, student).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Student> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
        let row = sqlx::query_as::<_, DbStudent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("student not found"))?;

        let guardians = self.guardian_ids(id).await?;
        row.into_student(guardians)
    }

    async fn list_students(&self) -> AppResult<Vec<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at");
        let rows = sqlx::query_as::<_, DbStudent>(&sql).fetch_all(&self.pool).await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            let guardians = self.guardian_ids(row.id).await?;
            students.push(row.into_student(guardians)?);
        }
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE students SET roll_number = ?, class_id = ?, section = ?, admission_date = ?, date_of_birth = ?, gender = ?, blood_group = ?, father_name = ?, mother_name = ?, parent_contact = ?, parent_email = ? WHERE id = ?",
        )
        .bind(&student.roll_number)
        .bind(student.class_id)
        .bind(&student.section)
        .bind(student.admission_date)
        .bind(student.date_of_birth)
        .bind(student.gender.as_str())
        .bind(student.blood_group.as_str())
        .bind(&student.parent_info.father_name)
        .bind(&student.parent_info.mother_name)
        .bind(&student.parent_info.parent_contact)
        .bind(&student.parent_info.parent_email)
        .bind(student.id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "student")?;
        replace_guardians(&mut tx, student).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "student")
    }

    async fn create_teacher(&self, account: &User, password_hash: &str, teacher: &Teacher) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, account, password_hash).await?;

        sqlx::query(
            "INSERT INTO teachers (id, user_id, employee_id, qualification, experience, subjects, classes, joining_date, salary, date_of_birth, gender, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(teacher.id)
        .bind(teacher.user_id)
        .bind(&teacher.employee_id)
        .bind(&teacher.qualification)
        .bind(teacher.experience)
        .bind(Json(&teacher.subjects))
        .bind(Json(&teacher.classes))
        .bind(teacher.joining_date)
        .bind(teacher.salary)
        .bind(teacher.date_of_birth)
        .bind(teacher.gender.map(|g| g.as_str()))
        .bind(teacher.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_teacher(&self, id: Uuid) -> AppResult<Teacher> {
        let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?");
        sqlx::query_as::<_, DbTeacher>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("teacher not found"))?
            .try_into()
    }

    async fn list_teachers(&self) -> AppResult<Vec<Teacher>> {
        let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY created_at");
        sqlx::query_as::<_, DbTeacher>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Teacher::try_from)
            .collect()
    }

    async fn update_teacher(&self, teacher: &Teacher) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE teachers SET employee_id = ?, qualification = ?, experience = ?, subjects = ?, classes = ?, joining_date = ?, salary = ?, date_of_birth = ?, gender = ? WHERE id = ?",
        )
        .bind(&teacher.employee_id)
        .bind(&teacher.qualification)
        .bind(teacher.experience)
        .bind(Json(&teacher.subjects))
        .bind(Json(&teacher.classes))
        .bind(teacher.joining_date)
        .bind(teacher.salary)
        .bind(teacher.date_of_birth)
        .bind(teacher.gender.map(|g| g.as_str()))
        .bind(teacher.id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "teacher")
    }

    async fn delete_teacher(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM teachers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        expect_one(result.rows_affected(), "teacher")
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_log (id, event_name, actor_id, subject_id, occurred_at, severity, payload, prev_hash, hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id)
        .bind(&entry.event_name)
        .bind(entry.actor_id)
        .bind(entry.subject_id)
        .bind(entry.occurred_at)
        .bind(entry.severity.as_str())
        .bind(Json(&entry.payload))
        .bind(&entry.prev_hash)
        .bind(&entry.hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_activity_hash(&self) -> AppResult<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>("SELECT hash FROM activity_log ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn list_activity(&self, limit: i64) -> AppResult<Vec<ActivityEntry>> {
        let rows = sqlx::query_as::<_, DbActivityEntry>(
            "SELECT id, event_name, actor_id, subject_id, occurred_at, severity, payload, prev_hash, hash FROM activity_log ORDER BY seq DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ActivityEntry::from).collect())
    }
}
