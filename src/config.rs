use crate::db;
use crate::timetable::Day;
use rusqlite::Connection;
use serde_json::{json, Map, Value as JsonValue};

pub const SETUP_TIMETABLE_KEY: &str = "setup.timetable";
pub const LOG_ENV: &str = "TIMETABLED_LOG";

/// Per-workspace timetable settings, stored as JSON in the settings table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimetableSetup {
    pub days: Vec<Day>,
    pub publish_checks_teacher_overlap: bool,
}

impl Default for TimetableSetup {
    fn default() -> Self {
        Self {
            days: Day::school_week(),
            publish_checks_teacher_overlap: false,
        }
    }
}

impl TimetableSetup {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "days": self.days.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "publishChecksTeacherOverlap": self.publish_checks_teacher_overlap,
        })
    }

    /// Applies a partial update. Unknown keys are ignored; bad values are
    /// reported without touching the rest.
    pub fn apply_patch(&mut self, patch: &Map<String, JsonValue>) -> Result<(), String> {
        if let Some(v) = patch.get("days") {
            self.days = parse_days(v)?;
        }
        if let Some(v) = patch.get("publishChecksTeacherOverlap") {
            self.publish_checks_teacher_overlap = v
                .as_bool()
                .ok_or("publishChecksTeacherOverlap must be boolean")?;
        }
        Ok(())
    }
}

fn parse_days(v: &JsonValue) -> Result<Vec<Day>, String> {
    let arr = v.as_array().ok_or("days must be array of day names")?;
    let mut out: Vec<Day> = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item.as_str().ok_or("days must be array of day names")?;
        let day: Day = s.parse().map_err(|e: crate::timetable::UnknownDay| e.to_string())?;
        if !out.contains(&day) {
            out.push(day);
        }
    }
    if out.is_empty() {
        return Err("days must contain at least one day".to_string());
    }
    out.sort();
    Ok(out)
}

pub fn load_timetable_setup(conn: &Connection) -> TimetableSetup {
    let obj = db::settings_get_json(conn, SETUP_TIMETABLE_KEY)
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let mut setup = TimetableSetup::default();
    // Stored values were validated on write; fall back field by field if not.
    if let Some(days) = obj.get("days").and_then(|v| parse_days(v).ok()) {
        setup.days = days;
    }
    if let Some(b) = obj
        .get("publishChecksTeacherOverlap")
        .and_then(|v| v.as_bool())
    {
        setup.publish_checks_teacher_overlap = b;
    }
    setup
}

pub fn save_timetable_setup(conn: &Connection, setup: &TimetableSetup) -> anyhow::Result<()> {
    db::settings_set_json(conn, SETUP_TIMETABLE_KEY, &setup.to_json())
}
