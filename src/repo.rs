//! Timetable storage. Callers take a `TimetableRepository` so the same
//! handlers run against the workspace database or an in-memory store.

use crate::timetable::{
    Day, Entry, Grid, GridLabel, LabelledGrid, NameLookup, Period, PeriodTable, PoolItem,
    PublishStatus, SlotKey,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
    #[error("stored timetable is corrupt: {0}")]
    Corrupt(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl RepoError {
    pub fn code(&self) -> &'static str {
        match self {
            RepoError::Storage(_) | RepoError::Corrupt(_) => "db_query_failed",
            RepoError::NotFound(_) => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTimetable {
    pub label: GridLabel,
    pub status: PublishStatus,
    pub grid: Grid,
    pub updated_at: Option<String>,
}

impl StoredTimetable {
    pub fn empty(label: GridLabel) -> Self {
        Self {
            label,
            status: PublishStatus::Draft,
            grid: Grid::new(),
            updated_at: None,
        }
    }

    pub fn labelled(&self) -> LabelledGrid {
        LabelledGrid::new(self.label.clone(), self.grid.clone())
    }
}

pub trait TimetableRepository {
    fn periods(&self) -> Result<PeriodTable, RepoError>;
    fn section_exists(&self, label: &GridLabel) -> Result<bool, RepoError>;
    fn load(&self, label: &GridLabel) -> Result<Option<StoredTimetable>, RepoError>;
    fn load_all(&self) -> Result<Vec<StoredTimetable>, RepoError>;
    /// Replaces the stored grid. A new timetable starts as draft; an existing
    /// one keeps its status.
    fn save(&mut self, label: &GridLabel, grid: &Grid) -> Result<StoredTimetable, RepoError>;
    fn set_status(
        &mut self,
        label: &GridLabel,
        status: PublishStatus,
    ) -> Result<StoredTimetable, RepoError>;
    fn pool(&self, label: &GridLabel) -> Result<Vec<PoolItem>, RepoError>;
    fn names(&self) -> Result<NameLookup, RepoError>;

    fn load_or_empty(&self, label: &GridLabel) -> Result<StoredTimetable, RepoError> {
        Ok(self
            .load(label)?
            .unwrap_or_else(|| StoredTimetable::empty(label.clone())))
    }

    /// Every stored grid, with `label` replaced by `draft` when given.
    fn all_grids_with(
        &self,
        label: &GridLabel,
        draft: Option<&Grid>,
    ) -> Result<Vec<LabelledGrid>, RepoError> {
        let mut grids: Vec<LabelledGrid> = self
            .load_all()?
            .into_iter()
            .filter(|t| draft.is_none() || &t.label != label)
            .map(|t| LabelledGrid::new(t.label, t.grid))
            .collect();
        if let Some(g) = draft {
            grids.push(LabelledGrid::new(label.clone(), g.clone()));
        }
        Ok(grids)
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct SqliteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn entries_for(&self, label: &GridLabel) -> Result<Grid, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT day, period_id, subject_id, teacher_id, room
             FROM timetable_entries
             WHERE class_id = ? AND section_id = ?",
        )?;
        let rows = stmt
            .query_map([&label.class_id, &label.section_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    Entry {
                        subject: r.get(2)?,
                        teacher: r.get(3)?,
                        room: r.get(4)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut cells = Vec::with_capacity(rows.len());
        for (day, period_id, entry) in rows {
            let day: Day = day
                .parse()
                .map_err(|e: crate::timetable::UnknownDay| RepoError::Corrupt(e.to_string()))?;
            cells.push((SlotKey::new(day, period_id), entry));
        }
        Ok(cells.into_iter().collect())
    }

    fn header(&self, label: &GridLabel) -> Result<Option<(PublishStatus, Option<String>)>, RepoError> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT status, updated_at FROM timetables WHERE class_id = ? AND section_id = ?",
                [&label.class_id, &label.section_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((status, updated_at)) => {
                let status = PublishStatus::parse(&status)
                    .ok_or_else(|| RepoError::Corrupt(format!("unknown status {}", status)))?;
                Ok(Some((status, updated_at)))
            }
        }
    }
}

impl TimetableRepository for SqliteRepository<'_> {
    fn periods(&self) -> Result<PeriodTable, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, time_range, is_break FROM periods ORDER BY sort_order, id",
        )?;
        let periods = stmt
            .query_map([], |r| {
                Ok(Period {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    time_range: r.get(2)?,
                    is_break: r.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PeriodTable::new(periods))
    }

    fn section_exists(&self, label: &GridLabel) -> Result<bool, RepoError> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM sections WHERE id = ? AND class_id = ?",
                [&label.section_id, &label.class_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }

    fn load(&self, label: &GridLabel) -> Result<Option<StoredTimetable>, RepoError> {
        let Some((status, updated_at)) = self.header(label)? else {
            return Ok(None);
        };
        Ok(Some(StoredTimetable {
            label: label.clone(),
            status,
            grid: self.entries_for(label)?,
            updated_at,
        }))
    }

    fn load_all(&self) -> Result<Vec<StoredTimetable>, RepoError> {
        let mut stmt = self
            .conn
            .prepare("SELECT class_id, section_id FROM timetables ORDER BY class_id, section_id")?;
        let labels = stmt
            .query_map([], |r| Ok(GridLabel::new(r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(labels.len());
        for label in labels {
            if let Some(t) = self.load(&label)? {
                out.push(t);
            }
        }
        Ok(out)
    }

    fn save(&mut self, label: &GridLabel, grid: &Grid) -> Result<StoredTimetable, RepoError> {
        let ts = now_ts();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO timetables(class_id, section_id, status, updated_at)
             VALUES(?, ?, 'draft', ?)
             ON CONFLICT(class_id, section_id) DO UPDATE SET updated_at = excluded.updated_at",
            params![label.class_id, label.section_id, ts],
        )?;
        tx.execute(
            "DELETE FROM timetable_entries WHERE class_id = ? AND section_id = ?",
            params![label.class_id, label.section_id],
        )?;
        {
            let mut ins = tx.prepare(
                "INSERT INTO timetable_entries(class_id, section_id, day, period_id, subject_id, teacher_id, room)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (slot, entry) in grid.iter() {
                ins.execute(params![
                    label.class_id,
                    label.section_id,
                    slot.day.name(),
                    slot.period_id,
                    entry.subject,
                    entry.teacher,
                    entry.room
                ])?;
            }
        }
        tx.commit()?;
        self.load(label)?
            .ok_or_else(|| RepoError::NotFound(format!("timetable {}", label)))
    }

    fn set_status(
        &mut self,
        label: &GridLabel,
        status: PublishStatus,
    ) -> Result<StoredTimetable, RepoError> {
        let ts = now_ts();
        self.conn.execute(
            "INSERT INTO timetables(class_id, section_id, status, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(class_id, section_id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
            params![label.class_id, label.section_id, status.as_str(), ts],
        )?;
        self.load(label)?
            .ok_or_else(|| RepoError::NotFound(format!("timetable {}", label)))
    }

    fn pool(&self, label: &GridLabel) -> Result<Vec<PoolItem>, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.subject_id, p.teacher_id, p.room
             FROM subject_pool p
             LEFT JOIN subjects s ON s.id = p.subject_id
             WHERE p.class_id = ? AND p.section_id = ?
             ORDER BY s.name, p.id",
        )?;
        let items = stmt
            .query_map([&label.class_id, &label.section_id], |r| {
                Ok(PoolItem {
                    id: r.get(0)?,
                    subject_id: r.get(1)?,
                    teacher_id: r.get(2)?,
                    room: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn names(&self) -> Result<NameLookup, RepoError> {
        let read = |sql: &str| -> Result<HashMap<String, String>, RepoError> {
            let mut stmt = self.conn.prepare(sql)?;
            let pairs = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok(pairs)
        };
        Ok(NameLookup {
            subjects: read("SELECT id, name FROM subjects")?,
            teachers: read("SELECT id, name FROM teachers")?,
        })
    }
}

/// Volatile store for tests and scratch sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    pub periods: PeriodTable,
    pub sections: Vec<GridLabel>,
    pub timetables: BTreeMap<GridLabel, StoredTimetable>,
    pub pools: HashMap<GridLabel, Vec<PoolItem>>,
    pub names: NameLookup,
}

impl MemoryRepository {
    pub fn new(periods: PeriodTable) -> Self {
        Self {
            periods,
            ..Self::default()
        }
    }

    pub fn with_section(mut self, label: GridLabel) -> Self {
        if !self.sections.contains(&label) {
            self.sections.push(label);
        }
        self
    }
}

impl TimetableRepository for MemoryRepository {
    fn periods(&self) -> Result<PeriodTable, RepoError> {
        Ok(self.periods.clone())
    }

    fn section_exists(&self, label: &GridLabel) -> Result<bool, RepoError> {
        Ok(self.sections.contains(label))
    }

    fn load(&self, label: &GridLabel) -> Result<Option<StoredTimetable>, RepoError> {
        Ok(self.timetables.get(label).cloned())
    }

    fn load_all(&self) -> Result<Vec<StoredTimetable>, RepoError> {
        Ok(self.timetables.values().cloned().collect())
    }

    fn save(&mut self, label: &GridLabel, grid: &Grid) -> Result<StoredTimetable, RepoError> {
        let ts = now_ts();
        let t = self
            .timetables
            .entry(label.clone())
            .or_insert_with(|| StoredTimetable::empty(label.clone()));
        t.grid = grid.clone();
        t.updated_at = Some(ts);
        Ok(t.clone())
    }

    fn set_status(
        &mut self,
        label: &GridLabel,
        status: PublishStatus,
    ) -> Result<StoredTimetable, RepoError> {
        let ts = now_ts();
        let t = self
            .timetables
            .entry(label.clone())
            .or_insert_with(|| StoredTimetable::empty(label.clone()));
        t.status = status;
        t.updated_at = Some(ts);
        Ok(t.clone())
    }

    fn pool(&self, label: &GridLabel) -> Result<Vec<PoolItem>, RepoError> {
        Ok(self.pools.get(label).cloned().unwrap_or_default())
    }

    fn names(&self) -> Result<NameLookup, RepoError> {
        Ok(self.names.clone())
    }
}
