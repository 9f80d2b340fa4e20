use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use school_admin::authz::Role;

mod common;
use common::{id_of, TestApp};

async fn create_class(t: &TestApp, admin: &str) -> Result<String> {
    let (status, class) = t
        .send(
            "POST",
            "/api/classes",
            Some(admin),
            Some(json!({ "name": "Grade 5", "sections": ["A", "B"], "academic_year": "2026-2027" })),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "class create failed: {class}");
    id_of(&class)
}

async fn enrol(t: &TestApp, admin: &str, class_id: &str, roll: &str, guardians: Vec<Uuid>) -> Result<Value> {
    let (status, student) = t
        .send(
            "POST",
            "/api/students",
            Some(admin),
            Some(json!({
                "name": format!("Student {roll}"),
                "email": format!("{}@school.test", roll.to_lowercase()),
                "password": "password123",
                "roll_number": roll,
                "class_id": class_id,
                "section": "A",
                "date_of_birth": "2015-03-14",
                "gender": "Female",
                "father_name": "Joe",
                "mother_name": "Jane",
                "parent_contact": "555-0100",
                "guardian_ids": guardians
            })),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "student create failed: {student}");
    Ok(student)
}

async fn hire(t: &TestApp, admin: &str, employee_id: &str) -> Result<Value> {
    let (status, teacher) = t
        .send(
            "POST",
            "/api/teachers",
            Some(admin),
            Some(json!({
                "name": format!("Teacher {employee_id}"),
                "email": format!("{}@school.test", employee_id.to_lowercase()),
                "password": "password123",
                "employee_id": employee_id,
                "qualification": "B.Ed",
                "subjects": ["Mathematics"],
                "salary": 1000
            })),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "teacher create failed: {teacher}");
    Ok(teacher)
}

#[tokio::test]
async fn student_reads_only_own_record() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;
    let class_id = create_class(&t, &admin).await?;
    let s1 = enrol(&t, &admin, &class_id, "S1", vec![]).await?;
    let s2 = enrol(&t, &admin, &class_id, "S2", vec![]).await?;

    let token = t.login("s1@school.test").await?;
    let (status, body) = t.send("GET", &format!("/api/students/{}", id_of(&s1)?), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roll_number"], "S1");

    let (status, body) = t.send("GET", &format!("/api/students/{}", id_of(&s2)?), Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_owner_or_guardian");

    // missing records are reported before any ownership decision
    let (status, _) = t.send("GET", &format!("/api/students/{}", Uuid::new_v4()), Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn guardian_reads_child_record() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;
    let class_id = create_class(&t, &admin).await?;
    let (parent, parent_token) = t.account("Parent", "parent@school.test", Role::Parent).await?;
    let (_, stranger_token) = t.account("Stranger", "stranger@school.test", Role::Parent).await?;
    let child = enrol(&t, &admin, &class_id, "S1", vec![parent.id]).await?;
    assert_eq!(child["guardian_ids"], json!([parent.id]));

    let uri = format!("/api/students/{}", id_of(&child)?);
    let (status, _) = t.send("GET", &uri, Some(&parent_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send("GET", &uri, Some(&stranger_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_owner_or_guardian");

    // admins pass ownership for every record
    let (status, _) = t.send("GET", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn teacher_updates_only_own_profile() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;
    let t1 = hire(&t, &admin, "T1").await?;
    hire(&t, &admin, "T2").await?;
    let t1_token = t.login("t1@school.test").await?;
    let t2_token = t.login("t2@school.test").await?;

    let uri = format!("/api/teachers/{}", id_of(&t1)?);
    let (status, body) = t
        .send("PUT", &uri, Some(&t2_token), Some(json!({ "qualification": "PhD" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_owner_or_guardian");

    let (status, body) = t
        .send("PUT", &uri, Some(&t1_token), Some(json!({ "qualification": "PhD" })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["qualification"], "PhD");

    // students are stopped by the role gate before ownership is looked at
    let (_, student_token) = t.account("Kid", "kid@school.test", Role::Student).await?;
    let (status, body) = t
        .send("PUT", &uri, Some(&student_token), Some(json!({ "qualification": "None" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role_not_permitted");

    Ok(())
}

#[tokio::test]
async fn class_with_students_cannot_be_deleted() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;
    let class_id = create_class(&t, &admin).await?;
    for roll in ["S1", "S2", "S3"] {
        enrol(&t, &admin, &class_id, roll, vec![]).await?;
    }

    let uri = format!("/api/classes/{}", class_id);
    let (status, body) = t.send("DELETE", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("3 students"), "{message}");

    let (status, _) = t.send("GET", &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn missing_credential_is_401_everywhere() -> Result<()> {
    let t = common::spawn_app().await?;
    let id = Uuid::new_v4();

    for (method, uri) in [
        ("GET", "/api/users".to_string()),
        ("GET", "/api/classes".to_string()),
        ("DELETE", format!("/api/classes/{}", id)),
        ("GET", format!("/api/students/{}", id)),
        ("PUT", format!("/api/teachers/{}", id)),
        ("GET", "/api/activity".to_string()),
    ] {
        let body = (method == "PUT").then(|| json!({}));
        let (status, reply) = t.send(method, &uri, None, body).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}: {reply}");
    }

    Ok(())
}

#[tokio::test]
async fn role_gate_per_operation() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, teacher) = t.account("Teach", "teach@school.test", Role::Teacher).await?;
    let (_, student) = t.account("Kid", "kid@school.test", Role::Student).await?;

    let (status, _) = t.send("GET", "/api/students", Some(&teacher), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("GET", "/api/classes", Some(&teacher), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send("GET", "/api/users", Some(&teacher), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role_not_permitted");

    let (status, _) = t.send("GET", "/api/classes", Some(&student), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send(
            "POST",
            "/api/classes",
            Some(&teacher),
            Some(json!({ "name": "Rogue", "sections": ["A"], "academic_year": "2026" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn users_edit_themselves_but_not_their_role() -> Result<()> {
    let t = common::spawn_app().await?;
    let (me, token) = t.account("Kid", "kid@school.test", Role::Student).await?;
    let (other, _) = t.account("Other", "other@school.test", Role::Student).await?;

    let (status, body) = t
        .send("PUT", &format!("/api/users/{}", me.id), Some(&token), Some(json!({ "phone": "555-0199" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "555-0199");

    let (status, body) = t
        .send("PUT", &format!("/api/users/{}", me.id), Some(&token), Some(json!({ "role": "admin" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role_not_permitted");

    let (status, _) = t.send("GET", &format!("/api/users/{}", other.id), Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
