use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type PeriodId = i64;

/// School day. Wraps `chrono::Weekday` so grids can sort Monday first and
/// serialize with full English names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Day(pub Weekday);

impl Day {
    pub const MONDAY: Day = Day(Weekday::Mon);
    pub const TUESDAY: Day = Day(Weekday::Tue);
    pub const WEDNESDAY: Day = Day(Weekday::Wed);
    pub const THURSDAY: Day = Day(Weekday::Thu);
    pub const FRIDAY: Day = Day(Weekday::Fri);
    pub const SATURDAY: Day = Day(Weekday::Sat);
    pub const SUNDAY: Day = Day(Weekday::Sun);

    pub fn name(self) -> &'static str {
        match self.0 {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn school_week() -> Vec<Day> {
        vec![
            Day::MONDAY,
            Day::TUESDAY,
            Day::WEDNESDAY,
            Day::THURSDAY,
            Day::FRIDAY,
        ]
    }
}

impl Ord for Day {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .num_days_from_monday()
            .cmp(&other.0.num_days_from_monday())
    }
}

impl PartialOrd for Day {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown day: {0}")]
pub struct UnknownDay(pub String);

impl FromStr for Day {
    type Err = UnknownDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts both "Mon" and "Monday", case-insensitively.
        s.trim()
            .parse::<Weekday>()
            .map(Day)
            .map_err(|_| UnknownDay(s.to_string()))
    }
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Day {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Composite grid key. Orders by day (Monday first) and then period id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    pub day: Day,
    pub period_id: PeriodId,
}

impl SlotKey {
    pub fn new(day: Day, period_id: PeriodId) -> Self {
        Self { day, period_id }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.period_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl Entry {
    pub fn new(subject: impl Into<String>, teacher: Option<&str>) -> Self {
        Self {
            subject: subject.into(),
            teacher: teacher.map(str::to_string),
            room: None,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self.normalized()
    }

    /// Trims ids and drops blank teacher/room values.
    pub fn normalized(self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            subject: self.subject.trim().to_string(),
            teacher: blank_to_none(self.teacher),
            room: blank_to_none(self.room),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: PeriodId,
    pub name: String,
    pub time_range: String,
    pub is_break: bool,
}

/// The workspace's fixed period sequence, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTable {
    periods: Vec<Period>,
}

impl PeriodTable {
    pub fn new(periods: Vec<Period>) -> Self {
        Self { periods }
    }

    pub fn get(&self, id: PeriodId) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn is_break(&self, id: PeriodId) -> bool {
        self.get(id).map(|p| p.is_break).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter()
    }

    pub fn teaching(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter().filter(|p| !p.is_break)
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Weekly schedule for one class section: at most one entry per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    cells: BTreeMap<SlotKey, Entry>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &SlotKey) -> Option<&Entry> {
        self.cells.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &Entry)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains_teacher(&self, teacher_id: &str) -> bool {
        self.cells
            .values()
            .any(|e| e.teacher.as_deref() == Some(teacher_id))
    }

    pub(crate) fn set(&mut self, slot: SlotKey, entry: Entry) -> Option<Entry> {
        self.cells.insert(slot, entry)
    }

    pub(crate) fn take(&mut self, slot: &SlotKey) -> Option<Entry> {
        self.cells.remove(slot)
    }
}

impl FromIterator<(SlotKey, Entry)> for Grid {
    fn from_iter<I: IntoIterator<Item = (SlotKey, Entry)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLabel {
    pub class_id: String,
    pub section_id: String,
}

impl GridLabel {
    pub fn new(class_id: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            section_id: section_id.into(),
        }
    }
}

impl fmt::Display for GridLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class_id, self.section_id)
    }
}

/// A grid together with the class section that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledGrid {
    pub label: GridLabel,
    pub grid: Grid,
}

impl LabelledGrid {
    pub fn new(label: GridLabel, grid: Grid) -> Self {
        Self { label, grid }
    }
}

/// Which grids a conflict check looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Section(GridLabel),
    Teacher(String),
    School,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
}

impl PublishStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(PublishStatus::Draft),
            "published" => Some(PublishStatus::Published),
            _ => None,
        }
    }
}
