//! `{ "<Day>-<periodId>": { subject, teacher, room? } }` schedule maps.
//!
//! This is the only place shapes are checked at runtime. Each bad key is
//! reported on its own so the caller can flag just those cells.

use super::model::{Day, Entry, Grid, PeriodId, SlotKey};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidKey {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleParseError {
    #[error("schedule must be an object")]
    NotAnObject,
    #[error("schedule has {} invalid cell(s)", .0.len())]
    InvalidKeys(Vec<InvalidKey>),
}

impl ScheduleParseError {
    pub fn details(&self) -> Option<Value> {
        match self {
            ScheduleParseError::NotAnObject => None,
            ScheduleParseError::InvalidKeys(keys) => Some(json!({ "invalidKeys": keys })),
        }
    }
}

pub fn parse_slot_key(raw: &str) -> Result<SlotKey, String> {
    let Some((day, period)) = raw.rsplit_once('-') else {
        return Err("key must look like <Day>-<periodId>".to_string());
    };
    let day: Day = day.parse().map_err(|e: super::model::UnknownDay| e.to_string())?;
    let period_id: PeriodId = period
        .trim()
        .parse()
        .map_err(|_| format!("period id must be an integer: {}", period))?;
    Ok(SlotKey::new(day, period_id))
}

fn opt_str(cell: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match cell.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{} must be string or null", key)),
    }
}

pub fn parse_entry(v: &Value) -> Result<Entry, String> {
    let cell = v.as_object().ok_or("cell must be an object")?;
    let subject = opt_str(cell, "subject")?.unwrap_or_default();
    let entry = Entry {
        subject,
        teacher: opt_str(cell, "teacher")?,
        room: opt_str(cell, "room")?,
    }
    .normalized();
    if entry.subject.is_empty() {
        return Err("missing subject".to_string());
    }
    Ok(entry)
}

pub fn parse_schedule(v: &Value) -> Result<Grid, ScheduleParseError> {
    let obj = match v {
        Value::Null => return Ok(Grid::new()),
        Value::Object(o) => o,
        _ => return Err(ScheduleParseError::NotAnObject),
    };
    let mut grid = Grid::new();
    let mut invalid = Vec::new();
    for (key, cell) in obj {
        let slot = match parse_slot_key(key) {
            Ok(s) => s,
            Err(reason) => {
                invalid.push(InvalidKey {
                    key: key.clone(),
                    reason,
                });
                continue;
            }
        };
        if cell.is_null() {
            continue;
        }
        match parse_entry(cell) {
            Ok(entry) => {
                grid.set(slot, entry);
            }
            Err(reason) => invalid.push(InvalidKey {
                key: key.clone(),
                reason,
            }),
        }
    }
    if !invalid.is_empty() {
        return Err(ScheduleParseError::InvalidKeys(invalid));
    }
    Ok(grid)
}

pub fn schedule_to_json(grid: &Grid) -> Value {
    let mut out = Map::new();
    for (slot, entry) in grid.iter() {
        out.insert(
            slot.to_string(),
            json!({
                "subject": entry.subject,
                "teacher": entry.teacher,
                "room": entry.room,
            }),
        );
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schedule_and_skips_null_cells() {
        let raw = json!({
            "Monday-1": { "subject": "math", "teacher": "t1" },
            "tue-2": { "subject": "art", "teacher": null, "room": "A6" },
            "Wednesday-3": null
        });
        let grid = parse_schedule(&raw).expect("parse");
        assert_eq!(grid.len(), 2);
        let tue = grid.get(&SlotKey::new(Day::TUESDAY, 2)).unwrap();
        assert_eq!(tue.teacher, None);
        assert_eq!(tue.room.as_deref(), Some("A6"));

        let back = schedule_to_json(&grid);
        assert_eq!(back["Monday-1"]["teacher"], json!("t1"));
        assert!(back.get("Tuesday-2").is_some());
    }

    #[test]
    fn reports_every_bad_key() {
        let raw = json!({
            "Moonday-1": { "subject": "math" },
            "Monday-x": { "subject": "math" },
            "Friday-2": { "teacher": "t1" },
            "Friday-3": { "subject": "ok" }
        });
        let Err(ScheduleParseError::InvalidKeys(keys)) = parse_schedule(&raw) else {
            panic!("expected invalid keys");
        };
        let mut names: Vec<&str> = keys.iter().map(|k| k.key.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Friday-2", "Monday-x", "Moonday-1"]);
    }

    #[test]
    fn non_object_schedule_is_rejected() {
        assert_eq!(
            parse_schedule(&json!([1, 2])),
            Err(ScheduleParseError::NotAnObject)
        );
        assert!(parse_schedule(&Value::Null).unwrap().is_empty());
    }
}
