mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn bundle_export_then_import_restores_timetables() {
    let workspace = temp_dir("timetabled-backup-src");
    let restored = temp_dir("timetabled-backup-dst");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "5" }));
    let class_id = str_field(&class, "classId");
    let section = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sections.create",
        json!({ "classId": class_id, "name": "A" }),
    );
    let section_id = str_field(&section, "sectionId");
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "timetable.save",
        json!({
            "classId": class_id, "sectionId": section_id,
            "schedule": { "Monday-1": { "subject": "reading", "teacher": "t9" } }
        }),
    );

    let bundle = workspace.join("backup.zip");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("timetable-workspace-v1"));
    assert!(bundle.is_file());

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": restored.to_string_lossy() }),
    );
    assert_eq!(imported["sha256"], exported["sha256"]);
    assert_eq!(imported["workspacePath"], json!(restored.to_string_lossy()));

    // The sidecar now serves the restored workspace.
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "timetable.open",
        json!({ "classId": class_id, "sectionId": section_id }),
    );
    assert_eq!(view["schedule"]["Monday-1"]["subject"], json!("reading"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "8",
        "backup.importWorkspaceBundle",
        json!({ "inPath": restored.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restored);
}
