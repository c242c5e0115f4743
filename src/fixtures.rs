use anyhow::Context;
use chrono::NaiveDate;

use crate::models::AttendanceStatus::{Absent, Present};
use crate::models::{AttendanceRecord, AttendanceStatus};

const FALL_2024: &str = "Fall 2024";

// (id, student, course, (year, month, day), status)
const SEED: &[(i64, i64, i64, (i32, u32, u32), AttendanceStatus)] = &[
    (1, 1, 1, (2024, 9, 2), Present),
    (2, 2, 1, (2024, 9, 2), Present),
    (3, 3, 1, (2024, 9, 2), Absent),
    (4, 4, 1, (2024, 9, 2), Present),
    (5, 1, 1, (2024, 9, 4), Present),
    (6, 2, 1, (2024, 9, 4), Absent),
    (7, 3, 1, (2024, 9, 4), Absent),
    (8, 4, 1, (2024, 9, 4), Present),
    (9, 1, 2, (2024, 9, 3), Present),
    (10, 5, 2, (2024, 9, 3), Present),
    (11, 6, 2, (2024, 9, 3), Absent),
    (12, 1, 2, (2024, 9, 5), Absent),
    (13, 5, 2, (2024, 9, 5), Present),
    (14, 6, 2, (2024, 9, 5), Absent),
    (15, 2, 3, (2024, 9, 6), Present),
    (16, 3, 3, (2024, 9, 6), Present),
    (17, 5, 3, (2024, 9, 6), Present),
    (18, 2, 3, (2024, 9, 9), Present),
    (19, 3, 3, (2024, 9, 9), Absent),
    (20, 5, 3, (2024, 9, 9), Present),
];

/// Demo attendance used when no database is configured.
pub fn seed_records() -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut records = Vec::with_capacity(SEED.len());

    for &(id, student_id, course_id, (year, month, day), status) in SEED {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .with_context(|| format!("invalid seed date for record {id}"))?;
        records.push(AttendanceRecord {
            id,
            student_id,
            course_id,
            date,
            status,
            semester: FALL_2024.to_string(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AttendanceAggregator;
    use crate::store::AttendanceStore;

    #[test]
    fn seed_loads_into_store() {
        let records = seed_records().unwrap();
        let store = AttendanceStore::with_records(records.clone()).unwrap();
        assert_eq!(store.len(), records.len());
    }

    #[test]
    fn seed_flags_only_students_below_threshold() {
        let records = seed_records().unwrap();
        let flagged: Vec<i64> = AttendanceAggregator::new(&records)
            .low_attendance_students(75)
            .into_iter()
            .map(|entry| entry.student_id)
            .collect();
        assert_eq!(flagged, vec![3, 6]);
    }
}
