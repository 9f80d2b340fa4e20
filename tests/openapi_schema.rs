use serde_json::Value;

#[test]
fn openapi_documents_every_resource() -> anyhow::Result<()> {
    let doc = school_admin::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");
    for path in [
        "/api/auth/register",
        "/api/auth/login",
        "/api/users/{id}",
        "/api/classes/{id}",
        "/api/students/{id}",
        "/api/teachers/{id}",
        "/api/activity",
    ] {
        assert!(paths.contains_key(path), "OpenAPI missing path '{}'", path);
    }

    let student = v
        .pointer("/components/schemas/Student/properties")
        .and_then(Value::as_object)
        .expect("components.schemas.Student.properties must exist");
    for k in ["roll_number", "class_id", "section", "guardian_ids", "parent_info"] {
        assert!(student.contains_key(k), "OpenAPI Student schema missing '{}'", k);
    }

    Ok(())
}
