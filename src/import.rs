use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;

use crate::models::{AttendanceStatus, NewAttendanceRecord};

#[derive(serde::Deserialize)]
struct CsvRow {
    student_id: i64,
    course_id: i64,
    date: Option<NaiveDate>,
    status: String,
    semester: String,
}

/// Reads `student_id,course_id,date,status,semester` rows. An empty date
/// is left for the store to fill in.
pub fn read_records<R: Read>(reader: R) -> anyhow::Result<Vec<NewAttendanceRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed attendance row on line {line}"))?;
        let status: AttendanceStatus = row
            .status
            .parse()
            .with_context(|| format!("bad status on line {line}"))?;

        records.push(NewAttendanceRecord {
            student_id: row.student_id,
            course_id: row.course_id,
            date: row.date,
            status,
            semester: row.semester,
        });
    }

    Ok(records)
}

pub fn read_csv(path: &Path) -> anyhow::Result<Vec<NewAttendanceRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_records(file).with_context(|| format!("failed to import {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = "\
student_id,course_id,date,status,semester
1,2,2024-09-03,present,Fall 2024
4,2,,Absent,Fall 2024
";

    #[test]
    fn reads_rows_and_leaves_blank_dates_unset() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                NewAttendanceRecord {
                    student_id: 1,
                    course_id: 2,
                    date: NaiveDate::from_ymd_opt(2024, 9, 3),
                    status: AttendanceStatus::Present,
                    semester: "Fall 2024".to_string(),
                },
                NewAttendanceRecord {
                    student_id: 4,
                    course_id: 2,
                    date: None,
                    status: AttendanceStatus::Absent,
                    semester: "Fall 2024".to_string(),
                },
            ]
        );
    }

    #[test]
    fn rejects_unknown_status_with_line_number() {
        let input = "student_id,course_id,date,status,semester\n1,1,2024-09-03,late,Fall 2024\n";
        let err = read_records(input.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "bad status on line 2");
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let input = "student_id,course_id,date,status,semester\nabc,1,,present,Fall 2024\n";
        assert!(read_records(input.as_bytes()).is_err());
    }

    #[test]
    fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let records = read_csv(file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_csv(Path::new("/nonexistent/attendance.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/attendance.csv"));
    }
}
