use super::model::{Entry, Grid, PeriodId, PeriodTable, SlotKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("unknown period {0}")]
    UnknownPeriod(PeriodId),
    #[error("period {0} is a break and cannot hold an entry")]
    BreakPeriod(PeriodId),
    #[error("entry subject must not be empty")]
    MissingSubject,
    #[error("no entry at {0}")]
    EmptySource(SlotKey),
    #[error("pool item not found: {0}")]
    UnknownPoolItem(String),
}

impl AssignError {
    pub fn code(&self) -> &'static str {
        match self {
            AssignError::EmptySource(_) | AssignError::UnknownPoolItem(_) => "not_found",
            _ => "bad_params",
        }
    }
}

/// A subject a section is taught, with its usual teacher and room. Quick
/// assignment copies these into a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolItem {
    pub id: String,
    pub subject_id: String,
    pub teacher_id: Option<String>,
    pub room: Option<String>,
}

impl PoolItem {
    pub fn to_entry(&self) -> Entry {
        Entry {
            subject: self.subject_id.clone(),
            teacher: self.teacher_id.clone(),
            room: self.room.clone(),
        }
        .normalized()
    }
}

fn check_target(periods: &PeriodTable, slot: &SlotKey) -> Result<(), AssignError> {
    match periods.get(slot.period_id) {
        None => Err(AssignError::UnknownPeriod(slot.period_id)),
        Some(p) if p.is_break => Err(AssignError::BreakPeriod(slot.period_id)),
        Some(_) => Ok(()),
    }
}

/// Returns a copy of `grid` with `slot` set to `entry`. Any previous entry in
/// that cell is discarded.
pub fn assign(
    grid: &Grid,
    periods: &PeriodTable,
    slot: SlotKey,
    entry: Entry,
) -> Result<Grid, AssignError> {
    check_target(periods, &slot)?;
    let entry = entry.normalized();
    if entry.subject.is_empty() {
        return Err(AssignError::MissingSubject);
    }
    let mut next = grid.clone();
    next.set(slot, entry);
    Ok(next)
}

pub fn clear(grid: &Grid, slot: &SlotKey) -> Grid {
    let mut next = grid.clone();
    next.take(slot);
    next
}

/// Drag-and-drop: moves the entry at `from` onto `to`, overwriting whatever
/// `to` held. Moving a cell onto itself is a no-op.
pub fn move_entry(
    grid: &Grid,
    periods: &PeriodTable,
    from: &SlotKey,
    to: SlotKey,
) -> Result<Grid, AssignError> {
    check_target(periods, &to)?;
    let Some(entry) = grid.get(from).cloned() else {
        return Err(AssignError::EmptySource(*from));
    };
    if *from == to {
        return Ok(grid.clone());
    }
    let mut next = grid.clone();
    next.take(from);
    next.set(to, entry);
    Ok(next)
}

pub fn quick_assign(
    grid: &Grid,
    periods: &PeriodTable,
    pool: &[PoolItem],
    pool_item_id: &str,
    slot: SlotKey,
) -> Result<Grid, AssignError> {
    let item = pool
        .iter()
        .find(|p| p.id == pool_item_id)
        .ok_or_else(|| AssignError::UnknownPoolItem(pool_item_id.to_string()))?;
    assign(grid, periods, slot, item.to_entry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::model::{Day, Period};

    fn periods() -> PeriodTable {
        PeriodTable::new(vec![
            Period {
                id: 1,
                name: "P1".into(),
                time_range: "08:00-08:45".into(),
                is_break: false,
            },
            Period {
                id: 2,
                name: "Lunch".into(),
                time_range: "12:00-12:40".into(),
                is_break: true,
            },
            Period {
                id: 3,
                name: "P3".into(),
                time_range: "12:40-13:25".into(),
                is_break: false,
            },
        ])
    }

    #[test]
    fn assign_overwrites_previous_entry() {
        let slot = SlotKey::new(Day::MONDAY, 1);
        let g0 = Grid::new();
        let g1 = assign(&g0, &periods(), slot, Entry::new("math", Some("t1"))).unwrap();
        let g2 = assign(&g1, &periods(), slot, Entry::new("phys", Some("t2"))).unwrap();
        assert_eq!(g2.len(), 1);
        assert_eq!(g2.get(&slot), Some(&Entry::new("phys", Some("t2"))));
        // Inputs are untouched.
        assert!(g0.is_empty());
        assert_eq!(g1.get(&slot).map(|e| e.subject.as_str()), Some("math"));
    }

    #[test]
    fn break_and_unknown_periods_are_refused() {
        let g = Grid::new();
        let e = Entry::new("math", Some("t1"));
        assert_eq!(
            assign(&g, &periods(), SlotKey::new(Day::MONDAY, 2), e.clone()),
            Err(AssignError::BreakPeriod(2))
        );
        assert_eq!(
            assign(&g, &periods(), SlotKey::new(Day::MONDAY, 9), e),
            Err(AssignError::UnknownPeriod(9))
        );
    }

    #[test]
    fn break_periods_stay_empty_after_any_assign_sequence() {
        let p = periods();
        let mut g = Grid::new();
        for day in Day::school_week() {
            for pid in [1, 2, 3] {
                if let Ok(next) = assign(&g, &p, SlotKey::new(day, pid), Entry::new("x", Some("t"))) {
                    g = next;
                }
            }
        }
        assert_eq!(g.len(), 10);
        assert!(g.iter().all(|(k, _)| !p.is_break(k.period_id)));
    }

    #[test]
    fn blank_subject_is_rejected() {
        let r = assign(
            &Grid::new(),
            &periods(),
            SlotKey::new(Day::MONDAY, 1),
            Entry::new("  ", None),
        );
        assert_eq!(r, Err(AssignError::MissingSubject));
    }

    #[test]
    fn move_entry_overwrites_target_and_empties_source() {
        let p = periods();
        let a = SlotKey::new(Day::MONDAY, 1);
        let b = SlotKey::new(Day::TUESDAY, 3);
        let g = assign(&Grid::new(), &p, a, Entry::new("math", Some("t1"))).unwrap();
        let g = assign(&g, &p, b, Entry::new("art", Some("t3"))).unwrap();
        let moved = move_entry(&g, &p, &a, b).unwrap();
        assert_eq!(moved.len(), 1);
        assert!(moved.get(&a).is_none());
        assert_eq!(moved.get(&b).map(|e| e.subject.as_str()), Some("math"));

        assert_eq!(
            move_entry(&moved, &p, &a, b),
            Err(AssignError::EmptySource(a))
        );
        assert_eq!(
            move_entry(&moved, &p, &b, SlotKey::new(Day::MONDAY, 2)),
            Err(AssignError::BreakPeriod(2))
        );
    }

    #[test]
    fn quick_assign_uses_pool_defaults() {
        let pool = vec![PoolItem {
            id: "pool-1".into(),
            subject_id: "chem".into(),
            teacher_id: Some("t5".into()),
            room: Some("Lab".into()),
        }];
        let slot = SlotKey::new(Day::FRIDAY, 3);
        let g = quick_assign(&Grid::new(), &periods(), &pool, "pool-1", slot).unwrap();
        let e = g.get(&slot).unwrap();
        assert_eq!(e.teacher.as_deref(), Some("t5"));
        assert_eq!(e.room.as_deref(), Some("Lab"));
        assert_eq!(
            quick_assign(&Grid::new(), &periods(), &pool, "nope", slot),
            Err(AssignError::UnknownPoolItem("nope".into()))
        );
    }

    #[test]
    fn clear_removes_only_that_cell() {
        let p = periods();
        let a = SlotKey::new(Day::MONDAY, 1);
        let b = SlotKey::new(Day::MONDAY, 3);
        let g = assign(&Grid::new(), &p, a, Entry::new("math", None)).unwrap();
        let g = assign(&g, &p, b, Entry::new("art", None)).unwrap();
        let g = clear(&g, &a);
        assert!(g.get(&a).is_none());
        assert!(g.get(&b).is_some());
    }
}
