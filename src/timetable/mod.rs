//! Weekly timetable grids: editing, double-booking checks and the publish
//! gate. Everything here is pure; storage and IPC live elsewhere.

mod conflicts;
mod edit;
mod export;
mod model;
mod overview;
mod publish;
pub mod wire;

pub use conflicts::{check_conflicts, Conflict, ConflictChecker, ConflictKind};
pub use edit::{assign, clear, move_entry, quick_assign, AssignError, PoolItem};
pub use export::{write_grid_csv, NameLookup};
pub use model::{
    Day, Entry, Grid, GridLabel, LabelledGrid, Period, PeriodId, PeriodTable, PublishStatus,
    Scope, SlotKey, UnknownDay,
};
pub use overview::{teacher_overview, OverviewCell, TeacherOverview};
pub use publish::{publish, PublishError};
