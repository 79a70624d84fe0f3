use super::conflicts::{Conflict, ConflictChecker};
use super::model::{GridLabel, LabelledGrid, Scope, SlotKey};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewCell {
    #[serde(flatten)]
    pub label: GridLabel,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Everything one teacher teaches in the week, gathered from every section
/// grid. A slot with more than one cell is a double-booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherOverview {
    pub teacher_id: String,
    pub cells: BTreeMap<SlotKey, Vec<OverviewCell>>,
    pub conflicts: Vec<Conflict>,
}

pub fn teacher_overview(
    checker: &ConflictChecker,
    teacher_id: &str,
    grids: &[LabelledGrid],
) -> TeacherOverview {
    let mut cells: BTreeMap<SlotKey, Vec<OverviewCell>> = BTreeMap::new();
    for lg in grids {
        for (slot, entry) in lg.grid.iter() {
            if entry.teacher.as_deref() != Some(teacher_id) {
                continue;
            }
            cells.entry(*slot).or_default().push(OverviewCell {
                label: lg.label.clone(),
                subject: entry.subject.clone(),
                room: entry.room.clone(),
            });
        }
    }
    for list in cells.values_mut() {
        list.sort_by(|a, b| a.label.cmp(&b.label));
    }
    let conflicts = checker.check(&Scope::Teacher(teacher_id.to_string()), grids);
    TeacherOverview {
        teacher_id: teacher_id.to_string(),
        cells,
        conflicts,
    }
}
