use uuid::Uuid;

use super::validation::{optional_text, Validator};
use super::{AccountInput, Change};
use crate::authz::Role;
use crate::db::Store;
use crate::errors::{AppError, AppResult};
use crate::models::class::Class;
use crate::models::student::{ParentInfo, Student, StudentCreateRequest, StudentUpdateRequest};
use crate::utils::{today, utc_now};

const MAX_ROLL_NUMBER: usize = 20;

async fn load_class(store: &dyn Store, v: &mut Validator, class_id: Uuid) -> AppResult<Option<Class>> {
    match store.get_class(class_id).await {
        Ok(class) => Ok(Some(class)),
        Err(AppError::NotFound(_)) => {
            v.invalid("class_id", "class not found");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Every guardian must be an existing account with the parent role.
async fn check_guardians(store: &dyn Store, v: &mut Validator, guardian_ids: &[Uuid]) -> AppResult<()> {
    for id in guardian_ids {
        match store.get_user(*id).await {
            Ok(user) if user.role == Role::Parent => {}
            Ok(_) => v.invalid("guardian_ids", format!("guardian {id} is not a parent account")),
            Err(AppError::NotFound(_)) => v.invalid("guardian_ids", format!("guardian {id} not found")),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn check_section(v: &mut Validator, class: Option<&Class>, section: &str) {
    if let Some(class) = class {
        if !section.is_empty() && !class.sections.iter().any(|s| s == section) {
            v.invalid(
                "section",
                format!("section {section} does not exist in class {}", class.name),
            );
        }
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// Creates the student profile together with its student-role account.
pub async fn create_student(store: &dyn Store, payload: StudentCreateRequest) -> AppResult<Student> {
    let mut v = Validator::new();
    let account = AccountInput {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
    }
    .validate(&mut v);

    let roll_number = v.required_text("roll_number", payload.roll_number);
    let class_id = v.present("class_id", payload.class_id);
    let section = v.required_text("section", payload.section);
    let date_of_birth = v.present("date_of_birth", payload.date_of_birth);
    let gender = v.present("gender", payload.gender);
    let father_name = v.required_text("father_name", payload.father_name);
    let mother_name = v.required_text("mother_name", payload.mother_name);
    let parent_contact = v.required_text("parent_contact", payload.parent_contact);
    v.max_chars("roll_number", Some(&roll_number), MAX_ROLL_NUMBER);

    let guardian_ids = dedup(payload.guardian_ids);
    if let Some(class_id) = class_id {
        let class = load_class(store, &mut v, class_id).await?;
        check_section(&mut v, class.as_ref(), &section);
    }
    check_guardians(store, &mut v, &guardian_ids).await?;
    v.finish()?;

    let (Some(class_id), Some(date_of_birth), Some(gender)) = (class_id, date_of_birth, gender) else {
        return Err(AppError::internal("student validation passed with missing fields"));
    };

    let (user, password_hash) = account.into_user(Role::Student)?;
    let student = Student {
        id: Uuid::new_v4(),
        user_id: user.id,
        roll_number,
        class_id,
        section,
        admission_date: payload.admission_date.unwrap_or_else(today),
        date_of_birth,
        gender,
        blood_group: payload.blood_group.unwrap_or_default(),
        parent_info: ParentInfo {
            father_name,
            mother_name,
            parent_contact,
            parent_email: optional_text(payload.parent_email),
        },
        guardian_ids,
        created_at: utc_now(),
    };

    store.create_student(&user, &password_hash, &student).await?;
    Ok(student)
}

pub async fn get_student(store: &dyn Store, id: Uuid) -> AppResult<Student> {
    store.get_student(id).await
}

pub async fn list_students(store: &dyn Store) -> AppResult<Vec<Student>> {
    store.list_students().await
}

pub async fn update_student(
    store: &dyn Store,
    id: Uuid,
    payload: StudentUpdateRequest,
) -> AppResult<Change<Student>> {
    let before = store.get_student(id).await?;
    let mut after = before.clone();
    let mut v = Validator::new();

    fn replace_text(v: &mut Validator, field: &str, target: &mut String, value: Option<String>) {
        if let Some(value) = value {
            let value = value.trim().to_string();
            v.check(!value.is_empty(), field, format!("{field} cannot be blank"));
            *target = value;
        }
    }

    replace_text(&mut v, "roll_number", &mut after.roll_number, payload.roll_number);
    replace_text(&mut v, "section", &mut after.section, payload.section);
    replace_text(&mut v, "father_name", &mut after.parent_info.father_name, payload.father_name);
    replace_text(&mut v, "mother_name", &mut after.parent_info.mother_name, payload.mother_name);
    replace_text(
        &mut v,
        "parent_contact",
        &mut after.parent_info.parent_contact,
        payload.parent_contact,
    );
    v.max_chars("roll_number", Some(&after.roll_number), MAX_ROLL_NUMBER);

    if let Some(class_id) = payload.class_id {
        after.class_id = class_id;
    }
    if let Some(date) = payload.admission_date {
        after.admission_date = date;
    }
    if let Some(date) = payload.date_of_birth {
        after.date_of_birth = date;
    }
    if let Some(gender) = payload.gender {
        after.gender = gender;
    }
    if let Some(group) = payload.blood_group {
        after.blood_group = group;
    }
    if payload.parent_email.is_some() {
        after.parent_info.parent_email = optional_text(payload.parent_email);
    }
    if let Some(ids) = payload.guardian_ids {
        after.guardian_ids = dedup(ids);
        check_guardians(store, &mut v, &after.guardian_ids).await?;
    }

    if after.class_id != before.class_id || after.section != before.section {
        let class = load_class(store, &mut v, after.class_id).await?;
        check_section(&mut v, class.as_ref(), &after.section);
    }
    v.finish()?;

    store.update_student(&after).await?;
    Ok(Change { before, after })
}

/// Removes the profile. The backing account stays and can be deleted
/// separately once no profile points at it.
pub async fn delete_student(store: &dyn Store, id: Uuid) -> AppResult<Student> {
    let student = store.get_student(id).await?;
    store.delete_student(id).await?;
    Ok(student)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::authz::Principal;
    use crate::db::MemoryStore;
    use crate::models::class::ClassUpdateRequest;
    use crate::models::user::{RegisterRequest, UserUpdateRequest};
    use crate::models::{Gender, ListInput};
    use crate::services::classes::{create_class, delete_class, tests::grade_five, update_class};
    use crate::services::users::{register, update_user};

    fn enrolment(class_id: Uuid, roll: &str) -> StudentCreateRequest {
        StudentCreateRequest {
            name: Some(format!("Student {roll}")),
            email: Some(format!("{}@school.test", roll.to_lowercase())),
            password: Some("password123".into()),
            roll_number: Some(roll.into()),
            class_id: Some(class_id),
            section: Some("A".into()),
            date_of_birth: NaiveDate::from_ymd_opt(2015, 3, 14),
            gender: Some(Gender::Female),
            father_name: Some("Joe".into()),
            mother_name: Some("Jane".into()),
            parent_contact: Some("555-0100".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_links_a_student_account() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let student = create_student(&store, enrolment(class.id, "R-001")).await.unwrap();

        let account = store.get_user(student.user_id).await.unwrap();
        assert_eq!(account.role, Role::Student);
        assert_eq!(student.admission_date, today());
        assert_eq!(student.blood_group.as_str(), "Unknown");
    }

    #[tokio::test]
    async fn unknown_class_names_class_id_and_writes_nothing() {
        let store = MemoryStore::new();
        let err = create_student(&store, enrolment(Uuid::new_v4(), "R-001")).await.unwrap_err();
        match err {
            AppError::Validation { fields, .. } => assert_eq!(fields, vec!["class_id"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(store.list_students().await.unwrap().is_empty());
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guardians_must_be_parents() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let not_a_parent = register(
            &store,
            RegisterRequest {
                name: Some("Other Kid".into()),
                email: Some("kid@school.test".into()),
                password: Some("password123".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let payload = StudentCreateRequest {
            guardian_ids: vec![not_a_parent.id],
            ..enrolment(class.id, "R-001")
        };
        match create_student(&store, payload).await.unwrap_err() {
            AppError::Validation { fields, .. } => assert_eq!(fields, vec!["guardian_ids"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn section_must_belong_to_class() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let payload = StudentCreateRequest {
            section: Some("Z".into()),
            ..enrolment(class.id, "R-001")
        };
        assert!(matches!(
            create_student(&store, payload).await,
            Err(AppError::Validation { ref fields, .. }) if fields == &vec!["section".to_string()]
        ));
    }

    #[tokio::test]
    async fn duplicate_roll_number_is_a_conflict() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        create_student(&store, enrolment(class.id, "R-001")).await.unwrap();
        let payload = StudentCreateRequest {
            email: Some("second@school.test".into()),
            ..enrolment(class.id, "R-001")
        };
        assert!(matches!(create_student(&store, payload).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn class_with_three_students_cannot_be_deleted() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        for roll in ["R-001", "R-002", "R-003"] {
            create_student(&store, enrolment(class.id, roll)).await.unwrap();
        }

        match delete_class(&store, class.id).await.unwrap_err() {
            AppError::Conflict(message) => assert!(message.contains('3'), "{message}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(store.get_class(class.id).await.is_ok());

        let detail = crate::services::classes::get_class(&store, class.id).await.unwrap();
        assert_eq!(detail.students_count, 3);
        assert_eq!(detail.students_by_section.get("A"), Some(&3));
        assert_eq!(detail.students_by_section.get("B"), Some(&0));
    }

    #[tokio::test]
    async fn update_moves_student_between_sections() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let student = create_student(&store, enrolment(class.id, "R-001")).await.unwrap();

        let change = update_student(
            &store,
            student.id,
            StudentUpdateRequest {
                section: Some("B".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(change.before.section, "A");
        assert_eq!(change.after.section, "B");
    }

    #[tokio::test]
    async fn deleting_profile_keeps_account() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let student = create_student(&store, enrolment(class.id, "R-001")).await.unwrap();

        delete_student(&store, student.id).await.unwrap();
        assert!(store.get_user(student.user_id).await.is_ok());
        assert_eq!(store.count_profiles(student.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn occupied_section_cannot_be_dropped() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        create_student(&store, enrolment(class.id, "R-001")).await.unwrap();

        let err = update_class(
            &store,
            class.id,
            ClassUpdateRequest {
                sections: Some(ListInput::Items(vec!["B".into()])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation { message, fields } => {
                assert_eq!(fields, vec!["sections"]);
                assert!(message.contains("section A"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(store.get_class(class.id).await.unwrap().sections, vec!["A", "B"]);

        // B is empty, so it can go.
        let change = update_class(
            &store,
            class.id,
            ClassUpdateRequest {
                sections: Some(ListInput::Items(vec!["A".into()])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(change.after.sections, vec!["A"]);
    }

    #[tokio::test]
    async fn linked_accounts_keep_their_role() {
        let store = MemoryStore::new();
        let admin = Principal::new(Uuid::new_v4(), "Admin", "admin@school.test", Role::Admin);
        let class = create_class(&store, grade_five()).await.unwrap();
        let parent = register(
            &store,
            RegisterRequest {
                name: Some("Jane Doe".into()),
                email: Some("jane@school.test".into()),
                password: Some("password123".into()),
                role: Some(Role::Parent),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let student = create_student(
            &store,
            StudentCreateRequest {
                guardian_ids: vec![parent.id],
                ..enrolment(class.id, "R-001")
            },
        )
        .await
        .unwrap();

        let to_teacher = UserUpdateRequest {
            role: Some(Role::Teacher),
            ..Default::default()
        };
        match update_user(&store, &admin, student.user_id, to_teacher).await.unwrap_err() {
            AppError::Conflict(message) => assert!(message.contains("profile"), "{message}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(store.get_user(student.user_id).await.unwrap().role, Role::Student);

        let to_student = UserUpdateRequest {
            role: Some(Role::Student),
            ..Default::default()
        };
        match update_user(&store, &admin, parent.id, to_student).await.unwrap_err() {
            AppError::Conflict(message) => assert!(message.contains("guardian"), "{message}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(store.get_user(parent.id).await.unwrap().role, Role::Parent);

        // Other fields on a linked account stay editable.
        let rename = UserUpdateRequest {
            name: Some("Jane Q. Doe".into()),
            role: Some(Role::Parent),
            ..Default::default()
        };
        let change = update_user(&store, &admin, parent.id, rename).await.unwrap();
        assert_eq!(change.after.name, "Jane Q. Doe");
    }
}
