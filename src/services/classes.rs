use std::collections::BTreeMap;

use uuid::Uuid;

use super::validation::{optional_text, Validator};
use super::Change;
use crate::authz::ResourceType;
use crate::db::Store;
use crate::errors::{AppError, AppResult};
use crate::models::class::{Class, ClassCreateRequest, ClassDetail, ClassUpdateRequest, DEFAULT_CAPACITY};
use crate::utils::utc_now;

const MAX_NAME: usize = 50;
const MAX_ROOM: usize = 20;
const MAX_DESCRIPTION: usize = 500;
const CAPACITY_RANGE: std::ops::RangeInclusive<i64> = 1..=100;

fn clean_sections(raw: Vec<String>) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    for section in raw.into_iter().map(|s| s.trim().to_string()) {
        if !section.is_empty() && !sections.contains(&section) {
            sections.push(section);
        }
    }
    sections
}

fn check_shape(v: &mut Validator, class: &Class) {
    v.max_chars("name", Some(&class.name), MAX_NAME);
    v.non_empty("sections", &class.sections);
    v.check(
        CAPACITY_RANGE.contains(&class.capacity),
        "capacity",
        format!(
            "capacity must be between {} and {}",
            CAPACITY_RANGE.start(),
            CAPACITY_RANGE.end()
        ),
    );
    v.max_chars("room", class.room.as_deref(), MAX_ROOM);
    v.max_chars("description", class.description.as_deref(), MAX_DESCRIPTION);
    if class.subjects.iter().any(|s| s.name.trim().is_empty()) {
        v.invalid("subjects", "subject names cannot be blank");
    }
}

/// Teacher references must point at existing teacher profiles.
async fn check_references(store: &dyn Store, v: &mut Validator, class: &Class) -> AppResult<()> {
    if let Some(teacher_id) = class.class_teacher_id {
        if !store.exists(ResourceType::Teacher, teacher_id).await? {
            v.invalid("class_teacher_id", "class teacher not found");
        }
    }
    for subject in &class.subjects {
        if let Some(teacher_id) = subject.teacher_id {
            if !store.exists(ResourceType::Teacher, teacher_id).await? {
                v.invalid("subjects", format!("teacher for subject {} not found", subject.name));
            }
        }
    }
    Ok(())
}

/// A section can only be dropped once no student is enrolled in it.
async fn check_dropped_sections(store: &dyn Store, v: &mut Validator, before: &Class, after: &Class) -> AppResult<()> {
    for section in before.sections.iter().filter(|s| !after.sections.contains(s)) {
        let enrolled = store.count_students_in_class(before.id, Some(section)).await?;
        if enrolled > 0 {
            v.invalid(
                "sections",
                format!("section {section} still has {enrolled} students enrolled"),
            );
        }
    }
    Ok(())
}

pub async fn create_class(store: &dyn Store, payload: ClassCreateRequest) -> AppResult<Class> {
    let mut v = Validator::new();
    let name = v.required_text("name", payload.name);
    let sections = clean_sections(v.required("sections", payload.sections.map(|s| s.into_vec())));
    let academic_year = v.required_text("academic_year", payload.academic_year);

    let now = utc_now();
    let class = Class {
        id: Uuid::new_v4(),
        name,
        sections,
        class_teacher_id: payload.class_teacher_id,
        subjects: payload.subjects.map(|s| s.into_vec()).unwrap_or_default(),
        academic_year,
        capacity: payload.capacity.unwrap_or(DEFAULT_CAPACITY),
        room: optional_text(payload.room),
        description: optional_text(payload.description),
        is_active: payload.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    check_shape(&mut v, &class);
    check_references(store, &mut v, &class).await?;
    v.finish()?;

    store.create_class(&class).await?;
    Ok(class)
}

pub async fn list_classes(store: &dyn Store) -> AppResult<Vec<Class>> {
    store.list_classes().await
}

/// Class with its total enrollment and a per-section breakdown. Every
/// configured section appears, even when empty.
pub async fn get_class(store: &dyn Store, id: Uuid) -> AppResult<ClassDetail> {
    let class = store.get_class(id).await?;
    let students_count = store.count_students_in_class(id, None).await?;

    let mut students_by_section = BTreeMap::new();
    for section in &class.sections {
        let count = store.count_students_in_class(id, Some(section)).await?;
        students_by_section.insert(section.clone(), count);
    }

    Ok(ClassDetail {
        class,
        students_count,
        students_by_section,
    })
}

pub async fn update_class(store: &dyn Store, id: Uuid, payload: ClassUpdateRequest) -> AppResult<Change<Class>> {
    let before = store.get_class(id).await?;
    let mut after = before.clone();
    let mut v = Validator::new();

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        v.check(!name.is_empty(), "name", "name cannot be blank");
        after.name = name;
    }
    if let Some(sections) = payload.sections {
        after.sections = clean_sections(sections.into_vec());
    }
    if let Some(subjects) = payload.subjects {
        after.subjects = subjects.into_vec();
    }
    if let Some(year) = payload.academic_year {
        let year = year.trim().to_string();
        v.check(!year.is_empty(), "academic_year", "academic_year cannot be blank");
        after.academic_year = year;
    }
    if let Some(teacher_id) = payload.class_teacher_id {
        after.class_teacher_id = teacher_id;
    }
    if let Some(capacity) = payload.capacity {
        after.capacity = capacity;
    }
    if payload.room.is_some() {
        after.room = optional_text(payload.room);
    }
    if payload.description.is_some() {
        after.description = optional_text(payload.description);
    }
    if let Some(active) = payload.is_active {
        after.is_active = active;
    }

    check_shape(&mut v, &after);
    check_references(store, &mut v, &after).await?;
    check_dropped_sections(store, &mut v, &before, &after).await?;
    v.finish()?;

    after.updated_at = utc_now();
    store.update_class(&after).await?;
    Ok(Change { before, after })
}

/// Refuses to delete a class that still has students enrolled.
pub async fn delete_class(store: &dyn Store, id: Uuid) -> AppResult<Class> {
    let class = store.get_class(id).await?;

    let enrolled = store.count_students_in_class(id, None).await?;
    if enrolled > 0 {
        return Err(AppError::conflict(format!(
            "cannot delete class: {enrolled} students are enrolled"
        )));
    }

    store.delete_class(id).await?;
    Ok(class)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::ListInput;

    pub(crate) fn grade_five() -> ClassCreateRequest {
        ClassCreateRequest {
            name: Some("Grade 5".into()),
            sections: Some(ListInput::Csv("A, B".into())),
            academic_year: Some("2026-2027".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        assert_eq!(class.sections, vec!["A", "B"]);
        assert_eq!(class.capacity, DEFAULT_CAPACITY);
        assert!(class.is_active);
        assert!(class.subjects.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_reported_together() {
        let store = MemoryStore::new();
        let err = create_class(&store, ClassCreateRequest::default()).await.unwrap_err();
        match err {
            AppError::Validation { fields, .. } => {
                assert_eq!(fields, vec!["name", "sections", "academic_year"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(store.list_classes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn capacity_and_lengths_are_bounded() {
        let store = MemoryStore::new();
        let payload = ClassCreateRequest {
            capacity: Some(101),
            room: Some("x".repeat(21)),
            ..grade_five()
        };
        match create_class(&store, payload).await.unwrap_err() {
            AppError::Validation { fields, .. } => assert_eq!(fields, vec!["capacity", "room"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_class_teacher_names_the_field() {
        let store = MemoryStore::new();
        let payload = ClassCreateRequest {
            class_teacher_id: Some(Uuid::new_v4()),
            ..grade_five()
        };
        match create_class(&store, payload).await.unwrap_err() {
            AppError::Validation { fields, .. } => assert_eq!(fields, vec!["class_teacher_id"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(store.list_classes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_is_partial() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let change = update_class(
            &store,
            class.id,
            ClassUpdateRequest {
                capacity: Some(25),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(change.before.capacity, DEFAULT_CAPACITY);
        assert_eq!(change.after.capacity, 25);
        assert_eq!(change.after.name, "Grade 5");
    }

    #[tokio::test]
    async fn update_rejects_empty_sections() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        let err = update_class(
            &store,
            class.id,
            ClassUpdateRequest {
                sections: Some(ListInput::Items(vec![])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(store.get_class(class.id).await.unwrap().sections, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn delete_empty_class() {
        let store = MemoryStore::new();
        let class = create_class(&store, grade_five()).await.unwrap();
        delete_class(&store, class.id).await.unwrap();
        assert!(matches!(store.get_class(class.id).await, Err(AppError::NotFound(_))));
    }
}
