//! Attendance records for a college: a record store, the aggregation rules
//! behind attendance badges and low-attendance alerts, and a Postgres adapter.

pub mod aggregate;
pub mod backend;
pub mod db;
pub mod error;
pub mod fixtures;
pub mod import;
pub mod models;
pub mod report;
pub mod store;

pub use aggregate::{AttendanceAggregator, DEFAULT_LOW_ATTENDANCE_THRESHOLD};
pub use backend::Backend;
pub use error::StoreError;
pub use store::AttendanceStore;
