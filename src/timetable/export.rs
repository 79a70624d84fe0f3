use super::model::{Day, Grid, PeriodTable, SlotKey};
use std::collections::HashMap;
use std::io::Write;

/// Display names for ids referenced by grid entries.
#[derive(Debug, Clone, Default)]
pub struct NameLookup {
    pub subjects: HashMap<String, String>,
    pub teachers: HashMap<String, String>,
}

impl NameLookup {
    fn subject<'a>(&'a self, id: &'a str) -> &'a str {
        self.subjects.get(id).map(String::as_str).unwrap_or(id)
    }

    fn teacher<'a>(&'a self, id: &'a str) -> &'a str {
        self.teachers.get(id).map(String::as_str).unwrap_or(id)
    }
}

/// Writes one row per day and one column per teaching period; cells read
/// `Subject (Teacher)`. Rooms are not exported. Returns the number of data
/// rows written.
pub fn write_grid_csv<W: Write>(
    out: W,
    grid: &Grid,
    periods: &PeriodTable,
    days: &[Day],
    names: &NameLookup,
) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    let teaching: Vec<_> = periods.teaching().collect();

    let mut header = vec!["Day".to_string()];
    header.extend(teaching.iter().map(|p| p.name.clone()));
    wtr.write_record(&header)?;

    for day in days {
        let mut row = vec![day.name().to_string()];
        for p in &teaching {
            let cell = match grid.get(&SlotKey::new(*day, p.id)) {
                None => String::new(),
                Some(e) => match e.teacher.as_deref() {
                    Some(t) => format!("{} ({})", names.subject(&e.subject), names.teacher(t)),
                    None => names.subject(&e.subject).to_string(),
                },
            };
            row.push(cell);
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(days.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::model::{Entry, Period};

    #[test]
    fn csv_has_day_rows_and_teaching_columns() {
        let periods = PeriodTable::new(vec![
            Period {
                id: 1,
                name: "P1".into(),
                time_range: "08:00-08:45".into(),
                is_break: false,
            },
            Period {
                id: 2,
                name: "Break".into(),
                time_range: "08:45-09:00".into(),
                is_break: true,
            },
            Period {
                id: 3,
                name: "P2".into(),
                time_range: "09:00-09:45".into(),
                is_break: false,
            },
        ]);
        let grid: Grid = [
            (
                SlotKey::new(Day::MONDAY, 1),
                Entry::new("math", Some("t1")).with_room("B11"),
            ),
            (SlotKey::new(Day::TUESDAY, 3), Entry::new("study", None)),
        ]
        .into_iter()
        .collect();
        let names = NameLookup {
            subjects: HashMap::from([("math".to_string(), "Mathematics".to_string())]),
            teachers: HashMap::from([("t1".to_string(), "Rivera, Ana".to_string())]),
        };
        let mut buf = Vec::new();
        let rows = write_grid_csv(
            &mut buf,
            &grid,
            &periods,
            &[Day::MONDAY, Day::TUESDAY],
            &names,
        )
        .unwrap();
        assert_eq!(rows, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Day,P1,P2");
        assert_eq!(lines[1], "Monday,\"Mathematics (Rivera, Ana)\",");
        assert_eq!(lines[2], "Tuesday,,study");
        assert!(!text.contains("B11"));
    }
}
