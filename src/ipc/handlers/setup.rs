use crate::config::{self, TimetableSetup};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

// Only the timetable section exists; `section` is accepted for
// compatibility with clients that always send it.
fn check_section(req: &Request) -> Result<(), serde_json::Value> {
    match req.params.get("section").and_then(|v| v.as_str()) {
        None | Some("timetable") => Ok(()),
        Some(_) => Err(err(&req.id, "bad_params", "unknown section", None)),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = check_section(req) {
        return e;
    }
    let setup = match state.db.as_ref() {
        Some(conn) => config::load_timetable_setup(conn),
        None => TimetableSetup::default(),
    };
    ok(&req.id, json!({ "timetable": setup.to_json() }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = check_section(req) {
        return e;
    }
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = config::load_timetable_setup(conn);
    if let Err(msg) = current.apply_patch(patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = config::save_timetable_setup(conn, &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true, "timetable": current.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
