//! Param extraction shared by handler families.

use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::timetable::{wire, Day, GridLabel, PeriodId, SlotKey};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

pub fn db_conn<'a>(state: &'a AppState) -> Result<&'a Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn opt_string(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    parse_opt_string(req.params.get(key))
        .map_err(|m| HandlerErr::bad_params(format!("{} {}", key, m)))
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

pub fn grid_label(req: &Request) -> Result<GridLabel, HandlerErr> {
    Ok(GridLabel::new(
        required_str(req, "classId")?,
        required_str(req, "sectionId")?,
    ))
}

fn slot_from(obj: &JsonValue, prefix: &str) -> Result<SlotKey, HandlerErr> {
    let day = obj
        .get("day")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}day", prefix)))?;
    let day: Day = day
        .parse()
        .map_err(|e: crate::timetable::UnknownDay| HandlerErr::bad_params(e.to_string()))?;
    let period_id: PeriodId = obj
        .get("periodId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("{}periodId must be integer", prefix)))?;
    Ok(SlotKey::new(day, period_id))
}

/// `{ day, periodId }` read from the top level of params.
pub fn slot(req: &Request) -> Result<SlotKey, HandlerErr> {
    slot_from(&req.params, "")
}

/// `{ day, periodId }` read from a nested object, e.g. `params.from`.
pub fn nested_slot(req: &Request, key: &str) -> Result<SlotKey, HandlerErr> {
    let obj = req
        .params
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    slot_from(obj, &format!("{}.", key))
}

pub fn schedule(req: &Request) -> Result<Option<crate::timetable::Grid>, HandlerErr> {
    let Some(raw) = req.params.get("schedule") else {
        return Ok(None);
    };
    wire::parse_schedule(raw).map(Some).map_err(|e| {
        let details = e.details();
        let he = HandlerErr::bad_params(e.to_string());
        match details {
            Some(d) => he.with_details(d),
            None => he,
        }
    })
}
