use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::authz::{ResourceRef, ResourceType};
use crate::errors::{AppError, AppResult};
use crate::models::activity::ActivityEntry;
use crate::models::class::Class;
use crate::models::student::Student;
use crate::models::teacher::Teacher;
use crate::models::user::User;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, (User, String)>,
    classes: HashMap<Uuid, Class>,
    students: HashMap<Uuid, Student>,
    teachers: HashMap<Uuid, Teacher>,
    activity: Vec<ActivityEntry>,
}

impl State {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|(user, _)| user.email == email && Some(user.id) != except)
    }

    fn has_profile(&self, user_id: Uuid) -> bool {
        self.students.values().any(|s| s.user_id == user_id) || self.teachers.values().any(|t| t.user_id == user_id)
    }

    fn check_new_account(&self, account: &User) -> AppResult<()> {
        if self.email_taken(&account.email, None) {
            return Err(AppError::conflict("email already in use"));
        }
        Ok(())
    }

    fn check_student(&self, student: &Student) -> AppResult<()> {
        if self
            .students
            .values()
            .any(|s| s.roll_number == student.roll_number && s.id != student.id)
        {
            return Err(AppError::conflict("roll number already in use"));
        }
        let dangling = !self.classes.contains_key(&student.class_id)
            || student.guardian_ids.iter().any(|id| !self.users.contains_key(id));
        if dangling {
            return Err(AppError::conflict("operation would break a reference between records"));
        }
        Ok(())
    }

    fn check_teacher(&self, teacher: &Teacher) -> AppResult<()> {
        if self
            .teachers
            .values()
            .any(|t| t.employee_id == teacher.employee_id && t.id != teacher.id)
        {
            return Err(AppError::conflict("employee id already in use"));
        }
        Ok(())
    }
}

/// Process-local store for tests and demos. Enforces the same uniqueness
/// and reference rules as the SQLite schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_resource_ref(&self, resource_type: ResourceType, id: Uuid) -> AppResult<ResourceRef> {
        let state = self.state.read().await;
        let resource = ResourceRef::new(resource_type, id);
        match resource_type {
            ResourceType::Student => state
                .students
                .get(&id)
                .map(|s| resource.owned_by(s.user_id).with_guardians(s.guardian_ids.iter().copied()))
                .ok_or_else(|| AppError::not_found("student not found")),
            ResourceType::Teacher => state
                .teachers
                .get(&id)
                .map(|t| resource.owned_by(t.user_id))
                .ok_or_else(|| AppError::not_found("teacher not found")),
            ResourceType::User => state
                .users
                .get(&id)
                .map(|_| resource.owned_by(id))
                .ok_or_else(|| AppError::not_found("user not found")),
            ResourceType::Class => state
                .classes
                .get(&id)
                .map(|_| resource)
                .ok_or_else(|| AppError::not_found("class not found")),
        }
    }

    async fn exists(&self, resource_type: ResourceType, id: Uuid) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(match resource_type {
            ResourceType::Student => state.students.contains_key(&id),
            ResourceType::Teacher => state.teachers.contains_key(&id),
            ResourceType::Class => state.classes.contains_key(&id),
            ResourceType::User => state.users.contains_key(&id),
        })
    }

    async fn create_user(&self, user: &User, password_hash: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_new_account(user)?;
        state.users.insert(user.id, (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<(User, String)>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|(user, _)| user.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().map(|(user, _)| user.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user(&self, user: &User, password_hash: Option<&str>) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(AppError::conflict("email already in use"));
        }
        let (stored, hash) = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        *stored = user.clone();
        if let Some(new_hash) = password_hash {
            *hash = new_hash.to_string();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(AppError::not_found("user not found"));
        }
        if state.has_profile(id) {
            return Err(AppError::conflict("operation would break a reference between records"));
        }
        state.users.remove(&id);
        for student in state.students.values_mut() {
            student.guardian_ids.retain(|g| *g != id);
        }
        Ok(())
    }

    async fn count_profiles(&self, user_id: Uuid) -> AppResult<i64> {
        let state = self.state.read().await;
        let students = state.students.values().filter(|s| s.user_id == user_id).count();
        let teachers = state.teachers.values().filter(|t| t.user_id == user_id).count();
        Ok((students + teachers) as i64)
    }

    async fn count_guardian_links(&self, user_id: Uuid) -> AppResult<i64> {
        let state = self.state.read().await;
        let linked = state
            .students
            .values()
            .filter(|s| s.guardian_ids.contains(&user_id))
            .count();
        Ok(linked as i64)
    }

    async fn create_class(&self, class: &Class) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.classes.insert(class.id, class.clone());
        Ok(())
    }

    async fn get_class(&self, id: Uuid) -> AppResult<Class> {
        let state = self.state.read().await;
        state
            .classes
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("class not found"))
    }

    async fn list_classes(&self) -> AppResult<Vec<Class>> {
        let state = self.state.read().await;
        let mut classes: Vec<Class> = state.classes.values().cloned().collect();
        classes.sort_by_key(|c| c.created_at);
        Ok(classes)
    }

    async fn update_class(&self, class: &Class) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .classes
            .get_mut(&class.id)
            .ok_or_else(|| AppError::not_found("class not found"))?;
        *stored = class.clone();
        Ok(())
    }

    async fn delete_class(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.classes.contains_key(&id) {
            return Err(AppError::not_found("class not found"));
        }
        if state.students.values().any(|s| s.class_id == id) {
            return Err(AppError::conflict("operation would break a reference between records"));
        }
        state.classes.remove(&id);
        Ok(())
    }

    async fn count_students_in_class(&self, class_id: Uuid, section: Option<&str>) -> AppResult<i64> {
        let state = self.state.read().await;
        let count = state
            .students
            .values()
            .filter(|s| s.class_id == class_id)
            .filter(|s| section.map_or(true, |sec| s.section == sec))
            .count();
        Ok(count as i64)
    }

    async fn create_student(&self, account: &User, password_hash: &str, student: &Student) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_new_account(account)?;
        state.check_student(student)?;
        state.users.insert(account.id, (account.clone(), password_hash.to_string()));
        state.students.insert(student.id, student.clone());
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Student> {
        let state = self.state.read().await;
        state
            .students
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("student not found"))
    }

    async fn list_students(&self) -> AppResult<Vec<Student>> {
        let state = self.state.read().await;
        let mut students: Vec<Student> = state.students.values().cloned().collect();
        students.sort_by_key(|s| s.created_at);
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(&student.id) {
            return Err(AppError::not_found("student not found"));
        }
        state.check_student(student)?;
        state.students.insert(student.id, student.clone());
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .students
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("student not found"))
    }

    async fn create_teacher(&self, account: &User, password_hash: &str, teacher: &Teacher) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_new_account(account)?;
        state.check_teacher(teacher)?;
        state.users.insert(account.id, (account.clone(), password_hash.to_string()));
        state.teachers.insert(teacher.id, teacher.clone());
        Ok(())
    }

    async fn get_teacher(&self, id: Uuid) -> AppResult<Teacher> {
        let state = self.state.read().await;
        state
            .teachers
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("teacher not found"))
    }

    async fn list_teachers(&self) -> AppResult<Vec<Teacher>> {
        let state = self.state.read().await;
        let mut teachers: Vec<Teacher> = state.teachers.values().cloned().collect();
        teachers.sort_by_key(|t| t.created_at);
        Ok(teachers)
    }

    async fn update_teacher(&self, teacher: &Teacher) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.teachers.contains_key(&teacher.id) {
            return Err(AppError::not_found("teacher not found"));
        }
        state.check_teacher(teacher)?;
        state.teachers.insert(teacher.id, teacher.clone());
        Ok(())
    }

    async fn delete_teacher(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.teachers.remove(&id).is_none() {
            return Err(AppError::not_found("teacher not found"));
        }
        for class in state.classes.values_mut() {
            if class.class_teacher_id == Some(id) {
                class.class_teacher_id = None;
            }
        }
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.activity.push(entry.clone());
        Ok(())
    }

    async fn last_activity_hash(&self) -> AppResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state.activity.last().map(|entry| entry.hash.clone()))
    }

    async fn list_activity(&self, limit: i64) -> AppResult<Vec<ActivityEntry>> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state.activity.iter().rev().take(limit).cloned().collect())
    }
}
