use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            other => anyhow::bail!("unknown attendance status '{other}'"),
        }
    }
}

/// One (student, course, date, status) observation as held by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub semester: String,
}

/// A record before the store has assigned it an id. A missing date is
/// filled with the store's current date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendanceRecord {
    pub student_id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
    pub semester: String,
}

impl NewAttendanceRecord {
    pub fn into_record(self, id: i64, today: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student_id: self.student_id,
            course_id: self.course_id,
            date: self.date.unwrap_or(today),
            status: self.status,
            semester: self.semester,
        }
    }
}

/// Partial update. Only the fields that are set overwrite the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePatch {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub semester: Option<String>,
}

impl AttendancePatch {
    pub fn status(status: AttendanceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut AttendanceRecord) {
        if let Some(student_id) = self.student_id {
            record.student_id = student_id;
        }
        if let Some(course_id) = self.course_id {
            record.course_id = course_id;
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(semester) = &self.semester {
            record.semester = semester.clone();
        }
    }
}

/// Record selection used by list views. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub semester: Option<String>,
    pub status: Option<AttendanceStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.student_id.map_or(true, |id| record.student_id == id)
            && self.course_id.map_or(true, |id| record.course_id == id)
            && self.date.map_or(true, |date| record.date == date)
            && self
                .semester
                .as_deref()
                .map_or(true, |semester| record.semester == semester)
            && self.status.map_or(true, |status| record.status == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_classes: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowAttendanceEntry {
    pub student_id: i64,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttendanceStats {
    /// Distinct session dates recorded for the course.
    pub total_classes: usize,
    pub average_attendance: u8,
    pub student_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceBand {
    Good,
    Warning,
    Low,
}

impl AttendanceBand {
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            90.. => AttendanceBand::Good,
            75..=89 => AttendanceBand::Warning,
            _ => AttendanceBand::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceBand::Good => "good",
            AttendanceBand::Warning => "warning",
            AttendanceBand::Low => "low",
        }
    }
}
