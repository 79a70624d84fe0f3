//! Class timetable workspace: the scheduling model, conflict checks and the
//! JSON-lines sidecar that serves them.

pub mod backup;
pub mod config;
pub mod db;
pub mod ipc;
pub mod repo;
pub mod service;
pub mod timetable;
