use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use chrono::NaiveDate;
use tracing::warn;

use crate::aggregate::AttendanceAggregator;
use crate::models::{AttendanceBand, AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCount {
    pub present: usize,
    pub absent: usize,
}

/// Present/absent counts per session date, newest first.
pub fn sessions_by_date(records: &[AttendanceRecord]) -> Vec<(NaiveDate, SessionCount)> {
    let mut map: BTreeMap<NaiveDate, SessionCount> = BTreeMap::new();

    for record in records {
        let entry = map.entry(record.date).or_default();
        match record.status {
            AttendanceStatus::Present => entry.present += 1,
            AttendanceStatus::Absent => entry.absent += 1,
        }
    }

    map.into_iter().rev().collect()
}

pub fn build_report(threshold: u8, records: &[AttendanceRecord]) -> String {
    let aggregator = AttendanceAggregator::new(records);
    let mut output = String::new();

    if records.is_empty() {
        warn!("building attendance report from an empty snapshot");
    }

    let students: HashSet<i64> = records.iter().map(|r| r.student_id).collect();
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Low attendance threshold: {threshold}%");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Records: {}", records.len());
    let _ = writeln!(output, "- Students: {}", students.len());
    let _ = writeln!(
        output,
        "- Present: {present}, absent: {}",
        records.len() - present
    );

    let overview = aggregator.course_overview();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Attendance");

    if overview.is_empty() {
        let _ = writeln!(output, "No attendance recorded yet.");
    } else {
        for (course_id, stats) in overview.iter() {
            let _ = writeln!(
                output,
                "- Course {}: {}% average ({}) across {} classes, {} students",
                course_id,
                stats.average_attendance,
                AttendanceBand::from_percentage(stats.average_attendance).label(),
                stats.total_classes,
                stats.student_count
            );
        }
    }

    let mut flagged = aggregator.low_attendance_students(threshold);
    flagged.sort_by_key(|entry| (entry.summary.percentage, entry.student_id));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Low Attendance Alerts");

    if flagged.is_empty() {
        let _ = writeln!(output, "No students below {threshold}%.");
    } else {
        for entry in flagged.iter() {
            let _ = writeln!(
                output,
                "- Student {}: {}% ({} present, {} absent of {} classes)",
                entry.student_id,
                entry.summary.percentage,
                entry.summary.present_count,
                entry.summary.absent_count,
                entry.summary.total_classes
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Sessions");

    let sessions = sessions_by_date(records);
    if sessions.is_empty() {
        let _ = writeln!(output, "No sessions recorded.");
    } else {
        for (date, count) in sessions.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: {} present, {} absent",
                date, count.present, count.absent
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pretty_assertions::assert_eq;

    #[test]
    fn sessions_are_newest_first() {
        let records = fixtures::seed_records().unwrap();
        let sessions = sessions_by_date(&records);

        assert_eq!(sessions[0].0, NaiveDate::from_ymd_opt(2024, 9, 9).unwrap());
        assert_eq!(
            sessions[0].1,
            SessionCount {
                present: 2,
                absent: 1
            }
        );
        assert_eq!(sessions.len(), 6);
    }

    #[test]
    fn report_lists_alerts_lowest_first() {
        let records = fixtures::seed_records().unwrap();
        let report = build_report(75, &records);

        assert!(report.starts_with("# Attendance Report\n"));
        assert!(report.contains("- Records: 20\n"));
        let student_six = report.find("- Student 6: 0%").unwrap();
        let student_three = report.find("- Student 3: 25%").unwrap();
        assert!(student_six < student_three);
        assert!(!report.contains("- Student 1:"));
    }

    #[test]
    fn report_shows_course_bands() {
        let records = fixtures::seed_records().unwrap();
        let report = build_report(75, &records);
        assert!(report.contains("- Course 3: 83% average (warning) across 2 classes, 3 students"));
    }

    #[test]
    fn course_lines_match_overview_figures() {
        let records = fixtures::seed_records().unwrap();
        let report = build_report(75, &records);
        let course_lines: Vec<&str> = report
            .lines()
            .filter(|line| line.starts_with("- Course "))
            .collect();

        assert_eq!(
            course_lines,
            vec![
                "- Course 1: 63% average (low) across 2 classes, 4 students",
                "- Course 2: 50% average (low) across 2 classes, 3 students",
                "- Course 3: 83% average (warning) across 2 classes, 3 students",
            ]
        );
    }

    #[test]
    fn empty_snapshot_renders_placeholders() {
        let report = build_report(75, &[]);
        assert!(report.contains("No attendance recorded yet."));
        assert!(report.contains("No students below 75%."));
        assert!(report.contains("No sessions recorded."));
    }
}
