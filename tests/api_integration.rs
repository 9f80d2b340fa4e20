use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::id_of;

#[tokio::test]
async fn full_api_flow() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;

    // -- create class
    let (status, class) = t
        .send(
            "POST",
            "/api/classes",
            Some(&admin),
            Some(json!({
                "name": "Grade 5",
                "sections": "A, B",
                "academic_year": "2026-2027",
                "subjects": "Mathematics, Science"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "class create failed: {class}");
    assert_eq!(class["sections"], json!(["A", "B"]));
    assert_eq!(class["capacity"], 30);
    assert_eq!(class["subjects"][1]["name"], "Science");
    let class_id = id_of(&class)?;

    // -- create teacher with account
    let (status, teacher) = t
        .send(
            "POST",
            "/api/teachers",
            Some(&admin),
            Some(json!({
                "name": "Anne Sullivan",
                "email": "anne@school.test",
                "password": "password123",
                "employee_id": "EMP-007",
                "qualification": "M.Ed",
                "subjects": ["Mathematics"],
                "salary": 42000.0,
                "classes": [{ "class_id": class_id, "section": "A" }]
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "teacher create failed: {teacher}");
    let teacher_id = id_of(&teacher)?;

    // -- assign the class teacher
    let (status, updated) = t
        .send(
            "PUT",
            &format!("/api/classes/{}", class_id),
            Some(&admin),
            Some(json!({ "class_teacher_id": teacher_id, "room": "B-12" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "class update failed: {updated}");
    assert_eq!(updated["class_teacher_id"], teacher_id.as_str());
    assert_eq!(updated["name"], "Grade 5");

    // -- create student with account
    let (status, student) = t
        .send(
            "POST",
            "/api/students",
            Some(&admin),
            Some(json!({
                "name": "Tom Sawyer",
                "email": "tom@school.test",
                "password": "password123",
                "roll_number": "R-042",
                "class_id": class_id,
                "section": "A",
                "date_of_birth": "2015-03-14",
                "gender": "Male",
                "blood_group": "O+",
                "father_name": "Joe",
                "mother_name": "Polly",
                "parent_contact": "555-0100"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "student create failed: {student}");
    assert_eq!(student["blood_group"], "O+");
    let student_id = id_of(&student)?;

    // -- the student can log in with the created account
    let (status, login) = t
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "tom@school.test", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["role"], "student");

    // -- class detail carries counts
    let (status, detail) = t.send("GET", &format!("/api/classes/{}", class_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["students_count"], 1);
    assert_eq!(detail["students_by_section"], json!({ "A": 1, "B": 0 }));

    // -- lists
    let (status, list) = t.send("GET", "/api/students", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    // -- delete student, then class
    let (status, _) = t.send("DELETE", &format!("/api/students/{}", student_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("DELETE", &format!("/api/classes/{}", class_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("GET", &format!("/api/classes/{}", class_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn referential_and_uniqueness_errors() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;

    // unknown class teacher names the field
    let (status, body) = t
        .send(
            "POST",
            "/api/classes",
            Some(&admin),
            Some(json!({
                "name": "Grade 6",
                "sections": ["A"],
                "academic_year": "2026-2027",
                "class_teacher_id": uuid::Uuid::new_v4()
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["class_teacher_id"]));

    // nothing was written
    let (_, list) = t.send("GET", "/api/classes", Some(&admin), None).await?;
    assert_eq!(list, json!([]));

    // malformed field type is a validation error naming the field
    let (status, body) = t
        .send(
            "POST",
            "/api/classes",
            Some(&admin),
            Some(json!({ "name": "Grade 6", "capacity": "lots" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["capacity"]));

    // duplicate employee id
    let teacher = json!({
        "name": "First",
        "email": "first@school.test",
        "password": "password123",
        "employee_id": "EMP-1",
        "qualification": "B.Ed",
        "subjects": ["Art"],
        "salary": 1000
    });
    let (status, _) = t.send("POST", "/api/teachers", Some(&admin), Some(teacher.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);

    let mut second = teacher;
    second["email"] = json!("second@school.test");
    let (status, body) = t.send("POST", "/api/teachers", Some(&admin), Some(second)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");

    // the failed create did not leave a stray account behind
    let (_, users) = t.send("GET", "/api/users", Some(&admin), None).await?;
    assert!(users
        .as_array()
        .map(|u| u.iter().all(|u| u["email"] != "second@school.test"))
        .unwrap_or(false));

    Ok(())
}

#[tokio::test]
async fn user_with_profile_cannot_be_deleted() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin().await?;

    let (status, teacher) = t
        .send(
            "POST",
            "/api/teachers",
            Some(&admin),
            Some(json!({
                "name": "Linked",
                "email": "linked@school.test",
                "password": "password123",
                "employee_id": "EMP-9",
                "qualification": "B.Ed",
                "subjects": ["Music"],
                "salary": 1000
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = teacher["user_id"].as_str().unwrap_or_default().to_string();

    let (status, body) = t.send("DELETE", &format!("/api/users/{}", user_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conflict");

    let (status, _) = t.send("DELETE", &format!("/api/teachers/{}", id_of(&teacher)?), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.send("DELETE", &format!("/api/users/{}", user_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}
