pub mod backup;
pub mod classes;
pub mod core;
pub mod directory;
pub mod setup;
pub mod timetable;
