//! Reference directories the timetable reads: subjects, teachers, periods
//! and each section's subject pool.

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{db_conn, grid_label, opt_string, parse_bool, required_str};
use crate::ipc::types::{AppState, Request};
use crate::repo::{SqliteRepository, TimetableRepository};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn list_named(conn: &Connection, sql: &str) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            let code: Option<String> = r.get(2)?;
            Ok(json!({ "id": id, "name": name, "code": code }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn subjects_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let subjects = list_named(conn, "SELECT id, name, code FROM subjects ORDER BY name")?;
    Ok(json!({ "subjects": subjects }))
}

fn subjects_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let name = required_str(req, "name")?;
    let code = opt_string(req, "code")?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, code) VALUES(?, ?, ?)",
        params![id, name, code],
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "subjects" }))
    })?;
    Ok(json!({ "subjectId": id, "name": name, "code": code }))
}

fn subjects_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = required_str(req, "subjectId")?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM subject_pool WHERE subject_id = ?", [&id])?;
    let n = tx.execute("DELETE FROM subjects WHERE id = ?", [&id])?;
    if n == 0 {
        return Err(HandlerErr::new("not_found", "subject not found"));
    }
    tx.commit()?;
    Ok(json!({ "ok": true }))
}

fn teachers_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let teachers = list_named(conn, "SELECT id, name, NULL FROM teachers ORDER BY name")?;
    Ok(json!({ "teachers": teachers }))
}

fn teachers_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let name = required_str(req, "name")?;
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO teachers(id, name) VALUES(?, ?)", params![id, name])
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "teachers" }))
        })?;
    Ok(json!({ "teacherId": id, "name": name }))
}

fn teachers_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = required_str(req, "teacherId")?;
    let tx = conn.unchecked_transaction()?;
    // Pool items fall back to "no default teacher"; stored grids keep the id.
    tx.execute(
        "UPDATE subject_pool SET teacher_id = NULL WHERE teacher_id = ?",
        [&id],
    )?;
    let n = tx.execute("DELETE FROM teachers WHERE id = ?", [&id])?;
    if n == 0 {
        return Err(HandlerErr::new("not_found", "teacher not found"));
    }
    tx.commit()?;
    Ok(json!({ "ok": true }))
}

fn periods_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let periods = SqliteRepository::new(conn).periods()?;
    let periods: Vec<_> = periods.iter().cloned().collect();
    Ok(json!({ "periods": periods }))
}

fn period_in_use(conn: &Connection, period_id: i64) -> Result<bool, HandlerErr> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM timetable_entries WHERE period_id = ? LIMIT 1",
            [period_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn periods_upsert(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = req
        .params
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("id must be integer"))?;
    let name = required_str(req, "name")?;
    let time_range = opt_string(req, "timeRange")?.unwrap_or_default();
    let is_break = parse_bool(req.params.get("isBreak"), false)
        .map_err(|m| HandlerErr::bad_params(format!("isBreak {}", m)))?;
    if is_break && period_in_use(conn, id)? {
        return Err(HandlerErr::new(
            "in_use",
            "period holds timetable entries and cannot become a break",
        )
        .with_details(json!({ "periodId": id })));
    }
    let existing_order: Option<i64> = conn
        .query_row("SELECT sort_order FROM periods WHERE id = ?", [id], |r| {
            r.get(0)
        })
        .optional()?;
    let sort_order = match (req.params.get("sortOrder").and_then(|v| v.as_i64()), existing_order) {
        (Some(v), _) => v,
        (None, Some(v)) => v,
        (None, None) => conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM periods",
            [],
            |r| r.get(0),
        )?,
    };
    conn.execute(
        "INSERT INTO periods(id, name, time_range, is_break, sort_order) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           time_range = excluded.time_range,
           is_break = excluded.is_break,
           sort_order = excluded.sort_order",
        params![id, name, time_range, is_break as i64, sort_order],
    )?;
    Ok(json!({ "ok": true, "periodId": id, "sortOrder": sort_order }))
}

fn periods_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = req
        .params
        .get("periodId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("periodId must be integer"))?;
    if period_in_use(conn, id)? {
        return Err(HandlerErr::new("in_use", "period holds timetable entries")
            .with_details(json!({ "periodId": id })));
    }
    match conn.execute("DELETE FROM periods WHERE id = ?", [id])? {
        0 => Err(HandlerErr::new("not_found", "period not found")),
        _ => Ok(json!({ "ok": true })),
    }
}

fn pool_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let label = grid_label(req)?;
    let pool = SqliteRepository::new(conn).pool(&label)?;
    Ok(json!({ "pool": pool }))
}

fn pool_upsert(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let label = grid_label(req)?;
    let subject_id = required_str(req, "subjectId")?;
    let teacher_id = opt_string(req, "teacherId")?;
    let room = opt_string(req, "room")?;
    if !SqliteRepository::new(conn).section_exists(&label)? {
        return Err(HandlerErr::new("not_found", "section not found"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subject_pool(id, class_id, section_id, subject_id, teacher_id, room)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(section_id, subject_id) DO UPDATE SET
           teacher_id = excluded.teacher_id,
           room = excluded.room",
        params![id, label.class_id, label.section_id, subject_id, teacher_id, room],
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string())
            .with_details(json!({ "table": "subject_pool" }))
    })?;
    let pool_item_id: String = conn.query_row(
        "SELECT id FROM subject_pool WHERE section_id = ? AND subject_id = ?",
        [&label.section_id, &subject_id],
        |r| r.get(0),
    )?;
    Ok(json!({ "poolItemId": pool_item_id }))
}

fn pool_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = required_str(req, "poolItemId")?;
    match conn.execute("DELETE FROM subject_pool WHERE id = ?", [&id])? {
        0 => Err(HandlerErr::new("not_found", "pool item not found")),
        _ => Ok(json!({ "ok": true })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => subjects_list(state),
        "subjects.create" => subjects_create(state, req),
        "subjects.delete" => subjects_delete(state, req),
        "teachers.list" => teachers_list(state),
        "teachers.create" => teachers_create(state, req),
        "teachers.delete" => teachers_delete(state, req),
        "periods.list" => periods_list(state),
        "periods.upsert" => periods_upsert(state, req),
        "periods.delete" => periods_delete(state, req),
        "pool.list" => pool_list(state, req),
        "pool.upsert" => pool_upsert(state, req),
        "pool.delete" => pool_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
