use super::model::{Day, GridLabel, LabelledGrid, PeriodId, PeriodTable, Scope, SlotKey};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Room,
}

/// One detected double-booking at a single slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub day: Day,
    pub period_id: PeriodId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub grids: Vec<GridLabel>,
    pub message: String,
}

impl Conflict {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.day, self.period_id)
    }

    pub fn involves(&self, label: &GridLabel) -> bool {
        self.grids.iter().any(|g| g == label)
    }
}

/// Double-booking rules over a set of labelled grids.
///
/// The checker never mutates its input and never fails: structurally valid
/// grids always produce a (possibly empty) list, ordered by slot, then kind,
/// then teacher id or room.
#[derive(Debug, Clone, Default)]
pub struct ConflictChecker {
    periods: PeriodTable,
    teacher_names: HashMap<String, String>,
}

impl ConflictChecker {
    pub fn new(periods: PeriodTable) -> Self {
        Self {
            periods,
            teacher_names: HashMap::new(),
        }
    }

    pub fn with_teacher_names(mut self, names: HashMap<String, String>) -> Self {
        self.teacher_names = names;
        self
    }

    fn teacher_display<'a>(&'a self, teacher_id: &'a str) -> &'a str {
        self.teacher_names
            .get(teacher_id)
            .map(String::as_str)
            .unwrap_or(teacher_id)
    }

    pub fn check(&self, scope: &Scope, grids: &[LabelledGrid]) -> Vec<Conflict> {
        let visible: Vec<&LabelledGrid> = match scope {
            Scope::Section(label) => grids.iter().filter(|g| &g.label == label).collect(),
            Scope::Teacher(teacher_id) => grids
                .iter()
                .filter(|g| g.grid.contains_teacher(teacher_id))
                .collect(),
            Scope::School => grids.iter().collect(),
        };
        let only_teacher = match scope {
            Scope::Teacher(t) => Some(t.as_str()),
            _ => None,
        };
        // Room clashes are only meaningful across grids; a single grid
        // can't hold two entries in one slot.
        let check_rooms = matches!(scope, Scope::School);

        let mut teachers: BTreeMap<(SlotKey, &str), BTreeSet<&GridLabel>> = BTreeMap::new();
        let mut rooms: BTreeMap<(SlotKey, String), (String, BTreeSet<&GridLabel>)> =
            BTreeMap::new();

        for lg in &visible {
            for (slot, entry) in lg.grid.iter() {
                if self.periods.is_break(slot.period_id) {
                    continue;
                }
                if let Some(t) = entry.teacher.as_deref() {
                    if only_teacher.map(|want| want == t).unwrap_or(true) {
                        teachers.entry((*slot, t)).or_default().insert(&lg.label);
                    }
                }
                if check_rooms {
                    if let Some(room) = entry.room.as_deref() {
                        let key = room.trim().to_lowercase();
                        if key.is_empty() {
                            continue;
                        }
                        rooms
                            .entry((*slot, key))
                            .or_insert_with(|| (room.trim().to_string(), BTreeSet::new()))
                            .1
                            .insert(&lg.label);
                    }
                }
            }
        }

        let mut out: Vec<Conflict> = Vec::new();
        for ((slot, teacher_id), labels) in teachers {
            if labels.len() < 2 {
                continue;
            }
            out.push(Conflict {
                kind: ConflictKind::Teacher,
                day: slot.day,
                period_id: slot.period_id,
                teacher_id: Some(teacher_id.to_string()),
                room: None,
                grids: labels.into_iter().cloned().collect(),
                message: format!(
                    "{} already assigned at this time",
                    self.teacher_display(teacher_id)
                ),
            });
        }
        for ((slot, _), (room, labels)) in rooms {
            if labels.len() < 2 {
                continue;
            }
            out.push(Conflict {
                kind: ConflictKind::Room,
                day: slot.day,
                period_id: slot.period_id,
                teacher_id: None,
                message: format!("room {} already booked at this time", room),
                room: Some(room),
                grids: labels.into_iter().cloned().collect(),
            });
        }
        out.sort_by(|a, b| {
            a.slot()
                .cmp(&b.slot())
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.teacher_id.cmp(&b.teacher_id))
                .then_with(|| a.room.cmp(&b.room))
        });
        out
    }
}

/// One-shot check without display names; messages fall back to teacher ids.
pub fn check_conflicts(
    scope: &Scope,
    periods: &PeriodTable,
    grids: &[LabelledGrid],
) -> Vec<Conflict> {
    ConflictChecker::new(periods.clone()).check(scope, grids)
}
