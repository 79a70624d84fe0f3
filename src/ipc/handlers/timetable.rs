use crate::config;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{
    db_conn, grid_label, nested_slot, opt_string, parse_bool, required_str, schedule, slot,
};
use crate::ipc::types::{AppState, Request};
use crate::repo::SqliteRepository;
use crate::service::{Edit, GridView, ServiceError, TimetableService};
use crate::timetable::{wire, GridLabel, Scope};
use serde_json::json;
use std::path::PathBuf;

impl From<ServiceError> for HandlerErr {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Repo(e) => e.into(),
            ServiceError::Assign(e) => HandlerErr::new(e.code(), e.to_string()),
            ServiceError::SectionNotFound(label) => {
                HandlerErr::new("not_found", "section not found").with_details(json!(label))
            }
            ServiceError::ConflictsPresent { source, conflicts } => {
                HandlerErr::new("conflicts_present", source.to_string())
                    .with_details(json!({ "conflicts": conflicts }))
            }
            ServiceError::Export(e) => HandlerErr::new("io_failed", format!("{e:#}")),
        }
    }
}

type Service<'a> = TimetableService<SqliteRepository<'a>>;

fn service(state: &AppState) -> Result<Service<'_>, HandlerErr> {
    let conn = db_conn(state)?;
    Ok(TimetableService::new(
        SqliteRepository::new(conn),
        config::load_timetable_setup(conn),
    ))
}

fn view_json(view: &GridView) -> serde_json::Value {
    json!({
        "classId": view.label.class_id,
        "sectionId": view.label.section_id,
        "status": view.status,
        "schedule": wire::schedule_to_json(&view.grid),
        "conflicts": view.conflicts,
        "teacherConflicts": view.teacher_conflicts,
        "updatedAt": view.updated_at,
    })
}

fn save_flag(req: &Request) -> Result<bool, HandlerErr> {
    parse_bool(req.params.get("save"), false)
        .map_err(|m| HandlerErr::bad_params(format!("save {}", m)))
}

fn handle_open(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let view = service(state)?.open(&label)?;
    Ok(view_json(&view))
}

fn handle_assign(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let slot = slot(req)?;
    let edit = match (req.params.get("entry"), opt_string(req, "poolItemId")?) {
        (Some(raw), None) => {
            let entry = wire::parse_entry(raw)
                .map_err(|reason| HandlerErr::bad_params(format!("entry {}", reason)))?;
            Edit::Assign(slot, entry)
        }
        (None, Some(pool_item_id)) => Edit::QuickAssign(slot, pool_item_id),
        (Some(_), Some(_)) => {
            return Err(HandlerErr::bad_params(
                "pass either entry or poolItemId, not both",
            ))
        }
        (None, None) => return Err(HandlerErr::bad_params("missing entry or poolItemId")),
    };
    let base = schedule(req)?;
    let persist = save_flag(req)?;
    let view = service(state)?.edit(&label, base, edit, persist)?;
    Ok(view_json(&view))
}

fn handle_clear(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let slot = slot(req)?;
    let base = schedule(req)?;
    let persist = save_flag(req)?;
    let view = service(state)?.edit(&label, base, Edit::Clear(slot), persist)?;
    Ok(view_json(&view))
}

fn handle_move(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let from = nested_slot(req, "from")?;
    let to = nested_slot(req, "to")?;
    let base = schedule(req)?;
    let persist = save_flag(req)?;
    let view = service(state)?.edit(&label, base, Edit::Move { from, to }, persist)?;
    Ok(view_json(&view))
}

fn handle_save(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let Some(grid) = schedule(req)? else {
        return Err(HandlerErr::bad_params("missing schedule"));
    };
    let view = service(state)?.save(&label, &grid)?;
    Ok(view_json(&view))
}

/// Scope resolution: explicit `scope` wins; otherwise `teacherId` picks the
/// teacher view and `classId` + `sectionId` the section's own grid.
fn handle_check_conflicts(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = opt_string(req, "teacherId")?;
    let class_id = opt_string(req, "classId")?;
    let section_id = opt_string(req, "sectionId")?;
    let label = match (class_id, section_id) {
        (Some(c), Some(s)) => Some(GridLabel::new(c, s)),
        (Some(_), None) => return Err(HandlerErr::bad_params("missing sectionId")),
        _ => None,
    };
    let scope = match opt_string(req, "scope")?.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("school") => Scope::School,
        Some("teacher") => Scope::Teacher(
            teacher_id.ok_or_else(|| HandlerErr::bad_params("missing teacherId"))?,
        ),
        Some("section") => Scope::Section(
            label
                .clone()
                .ok_or_else(|| HandlerErr::bad_params("missing classId or sectionId"))?,
        ),
        Some(_) => {
            return Err(HandlerErr::bad_params(
                "scope must be one of: section, teacher, school",
            ))
        }
        None => match (teacher_id, &label) {
            (Some(t), _) => Scope::Teacher(t),
            (None, Some(l)) => Scope::Section(l.clone()),
            (None, None) => {
                return Err(HandlerErr::bad_params(
                    "pass classId and sectionId, teacherId, or scope",
                ))
            }
        },
    };
    let draft = schedule(req)?;
    let conflicts = match (&scope, &label, &draft) {
        (_, Some(l), Some(g)) => service(state)?.check(&scope, Some((l, g)))?,
        // No owning section: the schedule is the teacher's proposed week.
        (Scope::Teacher(t), None, Some(g)) => service(state)?.check_teacher_week(t, g)?,
        (_, None, Some(_)) => {
            return Err(HandlerErr::bad_params(
                "schedule needs classId and sectionId",
            ))
        }
        (_, _, None) => service(state)?.check(&scope, None)?,
    };
    Ok(json!({ "conflicts": conflicts }))
}

fn handle_teacher_overview(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = required_str(req, "teacherId")?;
    let overview = service(state)?.teacher_overview(&teacher_id)?;
    let mut schedule = serde_json::Map::new();
    for (slot, cells) in &overview.cells {
        schedule.insert(slot.to_string(), json!(cells));
    }
    Ok(json!({
        "teacherId": overview.teacher_id,
        "schedule": schedule,
        "conflicts": overview.conflicts,
    }))
}

fn handle_publish(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let view = service(state)?.publish(&label)?;
    Ok(view_json(&view))
}

fn handle_unpublish(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let view = service(state)?.unpublish(&label)?;
    Ok(view_json(&view))
}

fn handle_export_csv(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let label = grid_label(req)?;
    let out_path = PathBuf::from(required_str(req, "outPath")?);
    let mut csv = Vec::new();
    let rows = service(state)?.export_csv(&label, &mut csv)?;
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string())
                .with_details(json!({ "path": parent.to_string_lossy() }))
        })?;
    }
    std::fs::write(&out_path, csv).map_err(|e| {
        HandlerErr::new("io_failed", e.to_string())
            .with_details(json!({ "path": out_path.to_string_lossy() }))
    })?;
    Ok(json!({
        "ok": true,
        "path": out_path.to_string_lossy(),
        "rowCount": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "timetable.open" => handle_open(state, req),
        "timetable.assign" => handle_assign(state, req),
        "timetable.clear" => handle_clear(state, req),
        "timetable.move" => handle_move(state, req),
        "timetable.save" => handle_save(state, req),
        "timetable.checkConflicts" => handle_check_conflicts(state, req),
        "timetable.teacherOverview" => handle_teacher_overview(state, req),
        "timetable.publish" => handle_publish(state, req),
        "timetable.unpublish" => handle_unpublish(state, req),
        "timetable.exportCsv" => handle_export_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
