use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::required_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

/// Period and timetable counts for the open workspace.
fn workspace_summary(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let (periods, teaching): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_break = 0 THEN 1 ELSE 0 END), 0)
         FROM periods",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let (timetables, published): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'published' THEN 1 ELSE 0 END), 0)
         FROM timetables",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(json!({
        "periodCount": periods,
        "teachingPeriodCount": teaching,
        "timetableCount": timetables,
        "publishedCount": published,
    }))
}

fn handle_health(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let workspace = match state.db.as_ref() {
        Some(conn) => workspace_summary(conn)?,
        None => serde_json::Value::Null,
    };
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy()),
        "workspace": workspace,
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(req, "path")?);
    let conn = db::open_db(&path).map_err(|e| {
        HandlerErr::new("db_open_failed", format!("{e:#}"))
            .with_details(json!({ "path": path.to_string_lossy() }))
    })?;
    let summary = workspace_summary(&conn)?;
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    Ok(json!({ "workspacePath": path.to_string_lossy(), "workspace": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
