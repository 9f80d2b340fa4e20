use uuid::Uuid;

use super::validation::Validator;
use super::{AccountInput, Change};
use crate::authz::{Principal, ResourceType, Role};
use crate::db::Store;
use crate::errors::AppResult;
use crate::models::teacher::{ClassAssignment, Teacher, TeacherCreateRequest, TeacherUpdateRequest};
use crate::utils::{today, utc_now};

const MAX_EMPLOYEE_ID: usize = 20;

fn clean_subjects(raw: Vec<String>) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for subject in raw.into_iter().map(|s| s.trim().to_string()) {
        if !subject.is_empty() && !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }
    subjects
}

fn check_shape(v: &mut Validator, teacher: &Teacher) {
    v.max_chars("employee_id", Some(&teacher.employee_id), MAX_EMPLOYEE_ID);
    v.non_empty("subjects", &teacher.subjects);
    v.check(teacher.experience >= 0, "experience", "experience cannot be negative");
    v.check(
        teacher.salary.is_finite() && teacher.salary >= 0.0,
        "salary",
        "salary cannot be negative",
    );
}

async fn check_assignments(store: &dyn Store, v: &mut Validator, classes: &[ClassAssignment]) -> AppResult<()> {
    for assignment in classes {
        if !store.exists(ResourceType::Class, assignment.class_id).await? {
            v.invalid("classes", format!("class {} not found", assignment.class_id));
        }
    }
    Ok(())
}

/// Creates the teacher profile together with its teacher-role account.
pub async fn create_teacher(store: &dyn Store, payload: TeacherCreateRequest) -> AppResult<Teacher> {
    let mut v = Validator::new();
    let account = AccountInput {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
    }
    .validate(&mut v);

    let employee_id = v.required_text("employee_id", payload.employee_id);
    let qualification = v.required_text("qualification", payload.qualification);
    let subjects = clean_subjects(v.required("subjects", payload.subjects));
    let salary = v.required("salary", payload.salary);

    let mut teacher = Teacher {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        employee_id,
        qualification,
        experience: payload.experience.unwrap_or(0),
        subjects,
        classes: payload.classes,
        joining_date: payload.joining_date.unwrap_or_else(today),
        salary,
        date_of_birth: payload.date_of_birth,
        gender: payload.gender,
        created_at: utc_now(),
    };

    check_shape(&mut v, &teacher);
    check_assignments(store, &mut v, &teacher.classes).await?;
    v.finish()?;

    let (user, password_hash) = account.into_user(Role::Teacher)?;
    teacher.user_id = user.id;
    store.create_teacher(&user, &password_hash, &teacher).await?;
    Ok(teacher)
}

pub async fn get_teacher(store: &dyn Store, id: Uuid) -> AppResult<Teacher> {
    store.get_teacher(id).await
}

pub async fn list_teachers(store: &dyn Store) -> AppResult<Vec<Teacher>> {
    store.list_teachers().await
}

/// Partial update. Teachers editing their own profile cannot change their
/// employee id or salary.
pub async fn update_teacher(
    store: &dyn Store,
    actor: &Principal,
    id: Uuid,
    payload: TeacherUpdateRequest,
) -> AppResult<Change<Teacher>> {
    let before = store.get_teacher(id).await?;
    let mut after = before.clone();
    let mut v = Validator::new();

    if !actor.is_admin() {
        if payload.employee_id.is_some() {
            v.invalid("employee_id", "only an admin can change the employee id");
        }
        if payload.salary.is_some() {
            v.invalid("salary", "only an admin can change the salary");
        }
    }

    if let Some(employee_id) = payload.employee_id {
        let employee_id = employee_id.trim().to_string();
        v.check(!employee_id.is_empty(), "employee_id", "employee_id cannot be blank");
        after.employee_id = employee_id;
    }
    if let Some(qualification) = payload.qualification {
        let qualification = qualification.trim().to_string();
        v.check(!qualification.is_empty(), "qualification", "qualification cannot be blank");
        after.qualification = qualification;
    }
    if let Some(experience) = payload.experience {
        after.experience = experience;
    }
    if let Some(subjects) = payload.subjects {
        after.subjects = clean_subjects(subjects);
    }
    if let Some(classes) = payload.classes {
        check_assignments(store, &mut v, &classes).await?;
        after.classes = classes;
    }
    if let Some(date) = payload.joining_date {
        after.joining_date = date;
    }
    if let Some(salary) = payload.salary {
        after.salary = salary;
    }
    if let Some(date) = payload.date_of_birth {
        after.date_of_birth = date;
    }
    if let Some(gender) = payload.gender {
        after.gender = gender;
    }

    check_shape(&mut v, &after);
    v.finish()?;

    store.update_teacher(&after).await?;
    Ok(Change { before, after })
}

/// Removes the profile. Classes naming this teacher as class teacher lose
/// that link.
pub async fn delete_teacher(store: &dyn Store, id: Uuid) -> AppResult<Teacher> {
    let teacher = store.get_teacher(id).await?;
    store.delete_teacher(id).await?;
    Ok(teacher)
}
