//! Timetable operations over an injected repository. IPC handlers are thin
//! adapters over this; tests drive it with `MemoryRepository`.

use crate::config::TimetableSetup;
use crate::repo::{RepoError, StoredTimetable, TimetableRepository};
use crate::timetable::{
    self, AssignError, Conflict, ConflictChecker, Grid, GridLabel, LabelledGrid, PeriodTable,
    PublishError, PublishStatus, Scope, SlotKey, TeacherOverview,
};
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Assign(#[from] AssignError),
    #[error("section {0} not found")]
    SectionNotFound(GridLabel),
    #[error("{source}")]
    ConflictsPresent {
        source: PublishError,
        conflicts: Vec<Conflict>,
    },
    #[error(transparent)]
    Export(#[from] anyhow::Error),
}

/// One grid edit, as a UI gesture translates to it.
#[derive(Debug, Clone)]
pub enum Edit {
    Assign(SlotKey, timetable::Entry),
    QuickAssign(SlotKey, String),
    Clear(SlotKey),
    Move { from: SlotKey, to: SlotKey },
}

/// A grid plus everything derived from it for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridView {
    pub label: GridLabel,
    pub status: PublishStatus,
    pub grid: Grid,
    /// Conflicts inside the grid's own scope; these gate publishing.
    pub conflicts: Vec<Conflict>,
    /// Cross-grid teacher double-bookings that involve this grid.
    pub teacher_conflicts: Vec<Conflict>,
    pub updated_at: Option<String>,
}

/// Rebuilds a client-supplied grid cell by cell under the single-assign
/// rules, so unknown and break periods never reach storage.
fn validated(periods: &PeriodTable, grid: &Grid) -> Result<Grid, AssignError> {
    let mut checked = Grid::new();
    for (slot, entry) in grid.iter() {
        checked = timetable::assign(&checked, periods, *slot, entry.clone())?;
    }
    Ok(checked)
}

pub struct TimetableService<R> {
    repo: R,
    setup: TimetableSetup,
}

impl<R: TimetableRepository> TimetableService<R> {
    pub fn new(repo: R, setup: TimetableSetup) -> Self {
        Self { repo, setup }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn setup(&self) -> &TimetableSetup {
        &self.setup
    }

    fn checker(&self) -> Result<ConflictChecker, RepoError> {
        Ok(ConflictChecker::new(self.repo.periods()?).with_teacher_names(self.repo.names()?.teachers))
    }

    fn require_section(&self, label: &GridLabel) -> Result<(), ServiceError> {
        if self.repo.section_exists(label)? {
            Ok(())
        } else {
            Err(ServiceError::SectionNotFound(label.clone()))
        }
    }

    fn view(
        &self,
        stored: StoredTimetable,
        grid: Grid,
    ) -> Result<GridView, ServiceError> {
        let checker = self.checker()?;
        let label = stored.label.clone();
        let own = [LabelledGrid::new(label.clone(), grid.clone())];
        let conflicts = checker.check(&Scope::Section(label.clone()), &own);
        let all = self.repo.all_grids_with(&label, Some(&grid))?;
        let teacher_conflicts = checker
            .check(&Scope::School, &all)
            .into_iter()
            .filter(|c| c.teacher_id.is_some() && c.involves(&label))
            .collect();
        Ok(GridView {
            label,
            status: stored.status,
            grid,
            conflicts,
            teacher_conflicts,
            updated_at: stored.updated_at,
        })
    }

    pub fn open(&self, label: &GridLabel) -> Result<GridView, ServiceError> {
        self.require_section(label)?;
        let stored = self.repo.load_or_empty(label)?;
        let grid = stored.grid.clone();
        self.view(stored, grid)
    }

    /// Applies `edit` to `base` (or the stored grid) and recomputes conflicts.
    /// Nothing is written unless `persist` is set.
    pub fn edit(
        &mut self,
        label: &GridLabel,
        base: Option<Grid>,
        edit: Edit,
        persist: bool,
    ) -> Result<GridView, ServiceError> {
        self.require_section(label)?;
        let stored = self.repo.load_or_empty(label)?;
        let periods = self.repo.periods()?;
        let base = match base {
            Some(grid) => validated(&periods, &grid)?,
            None => stored.grid.clone(),
        };
        let next = match edit {
            Edit::Assign(slot, entry) => timetable::assign(&base, &periods, slot, entry)?,
            Edit::QuickAssign(slot, pool_item_id) => {
                let pool = self.repo.pool(label)?;
                timetable::quick_assign(&base, &periods, &pool, &pool_item_id, slot)?
            }
            Edit::Clear(slot) => timetable::clear(&base, &slot),
            Edit::Move { from, to } => timetable::move_entry(&base, &periods, &from, to)?,
        };
        if persist {
            let saved = self.repo.save(label, &next)?;
            return self.view(saved, next);
        }
        self.view(stored, next)
    }

    /// Replaces the stored grid. Status is left alone, so a published grid
    /// stays published even if the new grid has conflicts.
    pub fn save(&mut self, label: &GridLabel, grid: &Grid) -> Result<GridView, ServiceError> {
        self.require_section(label)?;
        let periods = self.repo.periods()?;
        let checked = validated(&periods, grid)?;
        let saved = self.repo.save(label, &checked)?;
        tracing::info!(grid = %label, cells = checked.len(), "timetable saved");
        self.view(saved, checked)
    }

    /// Conflicts for `scope` over stored grids, with `draft` substituted for
    /// its section when given.
    pub fn check(
        &self,
        scope: &Scope,
        draft: Option<(&GridLabel, &Grid)>,
    ) -> Result<Vec<Conflict>, ServiceError> {
        let checker = self.checker()?;
        let grids = match (scope, draft) {
            (Scope::Section(label), Some((_, grid))) => {
                vec![LabelledGrid::new(label.clone(), grid.clone())]
            }
            (Scope::Section(label), None) => vec![self.repo.load_or_empty(label)?.labelled()],
            (_, Some((label, grid))) => self.repo.all_grids_with(label, Some(grid))?,
            (_, None) => self
                .repo
                .load_all()?
                .iter()
                .map(StoredTimetable::labelled)
                .collect(),
        };
        Ok(checker.check(scope, &grids))
    }

    /// Checks a proposed week for one teacher against the stored grids.
    ///
    /// A proposed cell identical to a stored one at the same slot is the
    /// lesson already on file, so one such stored copy is set aside before
    /// the check. Sending the current week back unchanged
    /// therefore reports only clashes that are already stored.
    pub fn check_teacher_week(
        &self,
        teacher_id: &str,
        proposed: &Grid,
    ) -> Result<Vec<Conflict>, ServiceError> {
        let checker = self.checker()?;
        let mut grids: Vec<LabelledGrid> = self
            .repo
            .load_all()?
            .iter()
            .map(StoredTimetable::labelled)
            .collect();
        for (slot, entry) in proposed.iter() {
            if entry.teacher.as_deref() != Some(teacher_id) {
                continue;
            }
            if let Some(lg) = grids.iter_mut().find(|lg| lg.grid.get(slot) == Some(entry)) {
                lg.grid.take(slot);
            }
        }
        grids.push(LabelledGrid::new(
            GridLabel::new("", "unsaved"),
            proposed.clone(),
        ));
        Ok(checker.check(&Scope::Teacher(teacher_id.to_string()), &grids))
    }

    pub fn teacher_overview(&self, teacher_id: &str) -> Result<TeacherOverview, ServiceError> {
        let checker = self.checker()?;
        let grids: Vec<LabelledGrid> = self
            .repo
            .load_all()?
            .iter()
            .map(StoredTimetable::labelled)
            .collect();
        Ok(timetable::teacher_overview(&checker, teacher_id, &grids))
    }

    pub fn publish(&mut self, label: &GridLabel) -> Result<GridView, ServiceError> {
        let view = self.open(label)?;
        let mut blocking = view.conflicts.clone();
        if self.setup.publish_checks_teacher_overlap {
            blocking.extend(view.teacher_conflicts.iter().cloned());
        }
        match timetable::publish(view.status, &blocking) {
            Ok(status) => {
                let saved = self.repo.set_status(label, status)?;
                tracing::info!(grid = %label, "timetable published");
                let grid = saved.grid.clone();
                self.view(saved, grid)
            }
            Err(source) => {
                tracing::warn!(grid = %label, conflicts = blocking.len(), "publish refused");
                Err(ServiceError::ConflictsPresent {
                    source,
                    conflicts: blocking,
                })
            }
        }
    }

    pub fn unpublish(&mut self, label: &GridLabel) -> Result<GridView, ServiceError> {
        self.require_section(label)?;
        let saved = self.repo.set_status(label, PublishStatus::Draft)?;
        let grid = saved.grid.clone();
        self.view(saved, grid)
    }

    pub fn export_csv<W: Write>(&self, label: &GridLabel, out: W) -> Result<usize, ServiceError> {
        self.require_section(label)?;
        let stored = self.repo.load_or_empty(label)?;
        let periods = self.repo.periods()?;
        let names = self.repo.names()?;
        Ok(timetable::write_grid_csv(
            out,
            &stored.grid,
            &periods,
            &self.setup.days,
            &names,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;
    use crate::timetable::{Day, Entry, Period, PeriodTable, PoolItem};

    fn periods() -> PeriodTable {
        PeriodTable::new(vec![
            Period {
                id: 1,
                name: "Period 1".into(),
                time_range: "08:00-08:45".into(),
                is_break: false,
            },
            Period {
                id: 2,
                name: "Period 2".into(),
                time_range: "08:45-09:30".into(),
                is_break: false,
            },
            Period {
                id: 3,
                name: "Break".into(),
                time_range: "09:30-09:45".into(),
                is_break: true,
            },
        ])
    }

    fn class_10() -> (GridLabel, GridLabel) {
        (GridLabel::new("10", "A"), GridLabel::new("10", "B"))
    }

    fn service() -> TimetableService<MemoryRepository> {
        let (a, b) = class_10();
        let mut repo = MemoryRepository::new(periods())
            .with_section(a)
            .with_section(b);
        repo.names
            .teachers
            .insert("T1".into(), "Mr. Okafor".into());
        TimetableService::new(repo, TimetableSetup::default())
    }

    #[test]
    fn cross_class_scenario_resolves_after_reassignment() {
        let mut svc = service();
        let (a, b) = class_10();
        let mon1 = SlotKey::new(Day::MONDAY, 1);

        let v = svc
            .edit(&a, None, Edit::Assign(mon1, Entry::new("math", Some("T1"))), true)
            .unwrap();
        assert!(v.conflicts.is_empty());
        assert!(v.teacher_conflicts.is_empty());

        let v = svc
            .edit(&b, None, Edit::Assign(mon1, Entry::new("physics", Some("T1"))), true)
            .unwrap();
        assert!(v.conflicts.is_empty());
        assert_eq!(v.teacher_conflicts.len(), 1);

        let overview = svc
            .check(&Scope::Teacher("T1".into()), None)
            .unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].day, Day::MONDAY);
        assert_eq!(overview[0].period_id, 1);
        assert_eq!(overview[0].teacher_id.as_deref(), Some("T1"));
        assert_eq!(overview[0].message, "Mr. Okafor already assigned at this time");

        // Own scope is clean, so publishing 10-A goes through.
        let published = svc.publish(&a).unwrap();
        assert_eq!(published.status, PublishStatus::Published);

        svc.edit(&a, None, Edit::Assign(mon1, Entry::new("math", Some("T2"))), true)
            .unwrap();
        assert!(svc
            .check(&Scope::Teacher("T1".into()), None)
            .unwrap()
            .is_empty());
        // Editing a published grid does not demote it.
        assert_eq!(svc.open(&a).unwrap().status, PublishStatus::Published);
    }

    #[test]
    fn publish_can_require_clean_teacher_overlap() {
        let mut svc = service();
        svc.setup.publish_checks_teacher_overlap = true;
        let (a, b) = class_10();
        let mon1 = SlotKey::new(Day::MONDAY, 1);
        svc.edit(&a, None, Edit::Assign(mon1, Entry::new("math", Some("T1"))), true)
            .unwrap();
        svc.edit(&b, None, Edit::Assign(mon1, Entry::new("art", Some("T1"))), true)
            .unwrap();

        let Err(ServiceError::ConflictsPresent { conflicts, .. }) = svc.publish(&a) else {
            panic!("expected publish to be refused");
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(svc.open(&a).unwrap().status, PublishStatus::Draft);
    }

    #[test]
    fn unsaved_edits_leave_the_store_alone() {
        let mut svc = service();
        let (a, _) = class_10();
        let slot = SlotKey::new(Day::TUESDAY, 2);
        let v = svc
            .edit(&a, None, Edit::Assign(slot, Entry::new("bio", None)), false)
            .unwrap();
        assert_eq!(v.grid.len(), 1);
        assert!(svc.open(&a).unwrap().grid.is_empty());

        // The client's working copy is the base for the next gesture.
        let v = svc
            .edit(
                &a,
                Some(v.grid),
                Edit::Move {
                    from: slot,
                    to: SlotKey::new(Day::MONDAY, 1),
                },
                false,
            )
            .unwrap();
        assert!(v.grid.get(&SlotKey::new(Day::MONDAY, 1)).is_some());
    }

    #[test]
    fn save_refuses_break_cells() {
        let mut svc = service();
        let (a, _) = class_10();
        let grid: Grid = [(SlotKey::new(Day::MONDAY, 3), Entry::new("x", None))]
            .into_iter()
            .collect();
        assert!(matches!(
            svc.save(&a, &grid),
            Err(ServiceError::Assign(AssignError::BreakPeriod(3)))
        ));
    }

    #[test]
    fn client_base_grid_is_validated_before_saving() {
        let mut svc = service();
        let (a, _) = class_10();
        let base: Grid = [
            (SlotKey::new(Day::MONDAY, 3), Entry::new("duty", None)),
            (SlotKey::new(Day::MONDAY, 99), Entry::new("ghost", None)),
        ]
        .into_iter()
        .collect();
        let res = svc.edit(
            &a,
            Some(base),
            Edit::Assign(SlotKey::new(Day::MONDAY, 1), Entry::new("math", None)),
            true,
        );
        assert!(matches!(res, Err(ServiceError::Assign(_))));
        assert!(svc.open(&a).unwrap().grid.is_empty());

        let only_unknown: Grid = [(SlotKey::new(Day::MONDAY, 99), Entry::new("ghost", None))]
            .into_iter()
            .collect();
        assert!(matches!(
            svc.edit(&a, Some(only_unknown), Edit::Clear(SlotKey::new(Day::MONDAY, 1)), true),
            Err(ServiceError::Assign(AssignError::UnknownPeriod(99)))
        ));
    }

    #[test]
    fn teacher_week_echo_is_clean_but_new_clash_is_not() {
        let mut svc = service();
        let (a, b) = class_10();
        let mon1 = SlotKey::new(Day::MONDAY, 1);
        let mon2 = SlotKey::new(Day::MONDAY, 2);
        svc.edit(&a, None, Edit::Assign(mon1, Entry::new("math", Some("T1"))), true)
            .unwrap();
        svc.edit(&b, None, Edit::Assign(mon2, Entry::new("art", Some("T1"))), true)
            .unwrap();

        let echo: Grid = [
            (mon1, Entry::new("math", Some("T1"))),
            (mon2, Entry::new("art", Some("T1"))),
        ]
        .into_iter()
        .collect();
        assert!(svc.check_teacher_week("T1", &echo).unwrap().is_empty());

        let moved: Grid = [(mon1, Entry::new("art", Some("T1")))].into_iter().collect();
        let conflicts = svc.check_teacher_week("T1", &moved).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].slot(), mon1);
    }

    #[test]
    fn unknown_section_is_reported() {
        let svc = service();
        assert!(matches!(
            svc.open(&GridLabel::new("12", "Z")),
            Err(ServiceError::SectionNotFound(_))
        ));
    }

    #[test]
    fn quick_assign_reads_section_pool() {
        let mut svc = service();
        let (a, _) = class_10();
        svc.repo.pools.insert(
            a.clone(),
            vec![PoolItem {
                id: "p1".into(),
                subject_id: "chem".into(),
                teacher_id: Some("T1".into()),
                room: Some("Lab".into()),
            }],
        );
        let slot = SlotKey::new(Day::WEDNESDAY, 2);
        let v = svc
            .edit(&a, None, Edit::QuickAssign(slot, "p1".into()), true)
            .unwrap();
        assert_eq!(v.grid.get(&slot).and_then(|e| e.room.as_deref()), Some("Lab"));
    }

    #[test]
    fn export_uses_configured_days() {
        let mut svc = service();
        svc.setup.days = vec![Day::MONDAY];
        let (a, _) = class_10();
        svc.edit(
            &a,
            None,
            Edit::Assign(SlotKey::new(Day::MONDAY, 2), Entry::new("math", Some("T1"))),
            true,
        )
        .unwrap();
        let mut buf = Vec::new();
        assert_eq!(svc.export_csv(&a, &mut buf).unwrap(), 1);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("math (Mr. Okafor)"));
    }
}
