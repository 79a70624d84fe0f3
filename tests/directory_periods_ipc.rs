mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn default_periods_and_in_use_guards() {
    let workspace = temp_dir("timetabled-periods");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let periods = request_ok(&mut stdin, &mut reader, "2", "periods.list", json!({}));
    let periods = periods["periods"].as_array().expect("periods").clone();
    assert_eq!(periods.len(), 10);
    let breaks: Vec<i64> = periods
        .iter()
        .filter(|p| p["isBreak"] == json!(true))
        .filter_map(|p| p["id"].as_i64())
        .collect();
    assert_eq!(breaks, vec![4, 7]);

    let class = request_ok(&mut stdin, &mut reader, "3", "classes.create", json!({ "name": "7" }));
    let class_id = str_field(&class, "classId");
    let section = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sections.create",
        json!({ "classId": class_id, "name": "A" }),
    );
    let section_id = str_field(&section, "sectionId");
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "timetable.assign",
        json!({
            "classId": class_id, "sectionId": section_id,
            "day": "Thursday", "periodId": 2,
            "entry": { "subject": "history" },
            "save": true
        }),
    );

    let to_break = request(
        &mut stdin,
        &mut reader,
        "6",
        "periods.upsert",
        json!({ "id": 2, "name": "Assembly", "isBreak": true }),
    );
    assert_eq!(error_code(&to_break), "in_use");
    let delete = request(
        &mut stdin,
        &mut reader,
        "7",
        "periods.delete",
        json!({ "periodId": 2 }),
    );
    assert_eq!(error_code(&delete), "in_use");

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "periods.upsert",
        json!({ "id": 10, "name": "Study", "timeRange": "14:15-15:00" }),
    );
    assert_eq!(renamed["sortOrder"], json!(9));
    request_ok(&mut stdin, &mut reader, "9", "periods.delete", json!({ "periodId": 10 }));
    let after = request_ok(&mut stdin, &mut reader, "10", "periods.list", json!({}));
    assert_eq!(after["periods"].as_array().map(|p| p.len()), Some(9));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn pool_items_drive_quick_assign() {
    let workspace = temp_dir("timetabled-pool");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "6" }));
    let class_id = str_field(&class, "classId");
    let section = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sections.create",
        json!({ "classId": class_id, "name": "A" }),
    );
    let section_id = str_field(&section, "sectionId");
    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({ "name": "Science" }),
    );
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.create",
        json!({ "name": "Dr Lee" }),
    );
    let subject_id = str_field(&subject, "subjectId");
    let teacher_id = str_field(&teacher, "teacherId");

    let item = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "pool.upsert",
        json!({
            "classId": class_id, "sectionId": section_id,
            "subjectId": subject_id, "teacherId": teacher_id, "room": "Lab 1"
        }),
    );
    let pool_item_id = str_field(&item, "poolItemId");

    let pool = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "pool.list",
        json!({ "classId": class_id, "sectionId": section_id }),
    );
    assert_eq!(pool["pool"].as_array().map(|p| p.len()), Some(1));

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "timetable.assign",
        json!({
            "classId": class_id, "sectionId": section_id,
            "day": "Friday", "periodId": 3,
            "poolItemId": pool_item_id
        }),
    );
    let cell = &view["schedule"]["Friday-3"];
    assert_eq!(cell["subject"], json!(subject_id));
    assert_eq!(cell["teacher"], json!(teacher_id));
    assert_eq!(cell["room"], json!("Lab 1"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "9",
        "timetable.assign",
        json!({
            "classId": class_id, "sectionId": section_id,
            "day": "Friday", "periodId": 3,
            "poolItemId": "nope"
        }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}
