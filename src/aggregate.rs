use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{
    AttendanceRecord, AttendanceStatus, AttendanceSummary, CourseAttendanceStats,
    LowAttendanceEntry,
};

pub const DEFAULT_LOW_ATTENDANCE_THRESHOLD: u8 = 75;

/// `round(100 * present / total)` with halves rounded up. No records counts as full attendance.
pub fn rounded_percentage(present: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((200 * present + total) / (2 * total)) as u8
}

fn rounded_mean(sum: usize, count: usize) -> u8 {
    if count == 0 {
        return 100;
    }
    ((2 * sum + count) / (2 * count)) as u8
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    present: usize,
    absent: usize,
}

impl Tally {
    fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    fn total(&self) -> usize {
        self.present + self.absent
    }

    fn percentage(&self) -> u8 {
        rounded_percentage(self.present, self.total())
    }

    fn summary(&self) -> AttendanceSummary {
        AttendanceSummary {
            total_classes: self.total(),
            present_count: self.present,
            absent_count: self.absent,
            percentage: self.percentage(),
        }
    }
}

/// Tallies keyed by `key`, in order of first appearance.
fn tallies_by<'r>(
    records: impl Iterator<Item = &'r AttendanceRecord>,
    key: impl Fn(&AttendanceRecord) -> i64,
) -> Vec<(i64, Tally)> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut tallies: Vec<(i64, Tally)> = Vec::new();

    for record in records {
        let id = key(record);
        let position = *positions.entry(id).or_insert_with(|| {
            tallies.push((id, Tally::default()));
            tallies.len() - 1
        });
        tallies[position].1.add(record.status);
    }

    tallies
}

/// Attendance statistics over one snapshot of records.
///
/// Every method reads only the borrowed slice, so a caller that wants
/// several figures from the same moment fetches the records once and
/// builds a single aggregator.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceAggregator<'a> {
    records: &'a [AttendanceRecord],
}

impl<'a> AttendanceAggregator<'a> {
    pub fn new(records: &'a [AttendanceRecord]) -> Self {
        Self { records }
    }

    fn tally(&self, predicate: impl Fn(&AttendanceRecord) -> bool) -> Tally {
        let mut tally = Tally::default();
        for record in self.records {
            if predicate(record) {
                tally.add(record.status);
            }
        }
        tally
    }

    pub fn attendance_percentage(&self, student_id: i64, course_id: Option<i64>) -> u8 {
        self.tally(|record| {
            record.student_id == student_id
                && course_id.map_or(true, |course_id| record.course_id == course_id)
        })
        .percentage()
    }

    pub fn student_summary(&self, student_id: i64) -> AttendanceSummary {
        self.tally(|record| record.student_id == student_id).summary()
    }

    /// Students with at least one record whose percentage is strictly below
    /// `threshold`, in order of their first record.
    pub fn low_attendance_students(&self, threshold: u8) -> Vec<LowAttendanceEntry> {
        let entries: Vec<LowAttendanceEntry> = tallies_by(self.records.iter(), |r| r.student_id)
            .into_iter()
            .filter(|(_, tally)| tally.percentage() < threshold)
            .map(|(student_id, tally)| LowAttendanceEntry {
                student_id,
                summary: tally.summary(),
            })
            .collect();

        debug!(threshold, flagged = entries.len(), "computed low attendance");
        entries
    }

    pub fn course_stats(&self, course_id: i64) -> CourseAttendanceStats {
        let records = self.records;
        let course_records = move || {
            records
                .iter()
                .filter(move |record| record.course_id == course_id)
        };

        let dates: HashSet<_> = course_records().map(|record| record.date).collect();
        let students = tallies_by(course_records(), |r| r.student_id);

        let percentage_sum: usize = students
            .iter()
            .map(|(_, tally)| usize::from(tally.percentage()))
            .sum();

        CourseAttendanceStats {
            total_classes: dates.len(),
            average_attendance: rounded_mean(percentage_sum, students.len()),
            student_count: students.len(),
        }
    }

    /// Stats for every course present in the snapshot, in first-appearance order.
    pub fn course_overview(&self) -> Vec<(i64, CourseAttendanceStats)> {
        tallies_by(self.records.iter(), |r| r.course_id)
            .into_iter()
            .map(|(course_id, _)| (course_id, self.course_stats(course_id)))
            .collect()
    }
}
