use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "timetable.sqlite3";

const DEFAULT_PERIODS: &[(i64, &str, &str, bool)] = &[
    (1, "Period 1", "08:00-08:45", false),
    (2, "Period 2", "08:45-09:30", false),
    (3, "Period 3", "09:30-10:15", false),
    (4, "Break", "10:15-10:30", true),
    (5, "Period 4", "10:30-11:15", false),
    (6, "Period 5", "11:15-12:00", false),
    (7, "Lunch", "12:00-12:45", true),
    (8, "Period 6", "12:45-13:30", false),
    (9, "Period 7", "13:30-14:15", false),
    (10, "Period 8", "14:15-15:00", false),
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Schema for a fresh or existing workspace. Every statement is idempotent.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            UNIQUE(class_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_class ON sections(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS periods(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            time_range TEXT NOT NULL,
            is_break INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    seed_default_periods(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_pool(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            room TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            UNIQUE(section_id, subject_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_pool_section ON subject_pool(section_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetables(
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            updated_at TEXT,
            PRIMARY KEY(class_id, section_id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    // Ids inside entries are references, not foreign keys: the checker
    // treats them as opaque and drafts may name entries before directories
    // are filled in.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            day TEXT NOT NULL,
            period_id INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            room TEXT,
            PRIMARY KEY(class_id, section_id, day, period_id),
            FOREIGN KEY(class_id, section_id) REFERENCES timetables(class_id, section_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_entries_teacher ON timetable_entries(teacher_id)",
        [],
    )?;

    Ok(())
}

fn seed_default_periods(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM periods", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    for (i, (id, name, time_range, is_break)) in DEFAULT_PERIODS.iter().enumerate() {
        conn.execute(
            "INSERT INTO periods(id, name, time_range, is_break, sort_order) VALUES(?, ?, ?, ?, ?)",
            (id, name, time_range, *is_break as i64, i as i64),
        )?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}
