use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::info;

use crate::error::StoreError;
use crate::fixtures;
use crate::models::{AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter};
use crate::store::plan_ids;

const TOGGLE_STATUS: &str = r#"
    UPDATE college_attendance.records
    SET status = CASE status WHEN 'present' THEN 'absent' ELSE 'present' END
    WHERE id = $1
    RETURNING id, student_id, course_id, date, status, semester
"#;

const SELECT_RECORDS: &str = "SELECT id, student_id, course_id, date, status, semester \
     FROM college_attendance.records";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for record in fixtures::seed_records()? {
        let result = sqlx::query(
            r#"
            INSERT INTO college_attendance.records
            (id, student_id, course_id, date, status, semester)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(record.course_id)
        .bind(record.date)
        .bind(record.status.as_str())
        .bind(&record.semester)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn record_from_row(row: &PgRow) -> anyhow::Result<AttendanceRecord> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        course_id: row.try_get("course_id")?,
        date: row.try_get("date")?,
        status: status.parse()?,
        semester: row.try_get("semester")?,
    })
}

/// Records matching `filter`, ordered by id.
pub async fn fetch_records(
    pool: &PgPool,
    filter: &RecordFilter,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut query = QueryBuilder::<Postgres>::new(SELECT_RECORDS);
    query.push(" WHERE TRUE");

    if let Some(student_id) = filter.student_id {
        query.push(" AND student_id = ").push_bind(student_id);
    }
    if let Some(course_id) = filter.course_id {
        query.push(" AND course_id = ").push_bind(course_id);
    }
    if let Some(date) = filter.date {
        query.push(" AND date = ").push_bind(date);
    }
    if let Some(semester) = &filter.semester {
        query.push(" AND semester = ").push_bind(semester.clone());
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    query.push(" ORDER BY id");

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .context("failed to fetch attendance records")?;
    rows.iter().map(record_from_row).collect()
}

pub async fn fetch_record(pool: &PgPool, id: i64) -> anyhow::Result<AttendanceRecord> {
    let row = sqlx::query(&format!("{SELECT_RECORDS} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound { id })?;
    record_from_row(&row)
}

/// Inserts every record in one transaction. The table lock keeps `MAX(id)`
/// stable until commit, so concurrent batches never share ids.
pub async fn insert_bulk(
    pool: &PgPool,
    records: Vec<NewAttendanceRecord>,
    today: NaiveDate,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut tx = pool.begin().await?;

    sqlx::query("LOCK TABLE college_attendance.records IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;
    let current_max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(id) FROM college_attendance.records")
            .fetch_one(&mut *tx)
            .await?;
    let ids = plan_ids(current_max, records.len())?;

    let mut created = Vec::with_capacity(records.len());
    for (record, id) in records.into_iter().zip(ids) {
        let record = record.into_record(id, today);
        sqlx::query(
            r#"
            INSERT INTO college_attendance.records
            (id, student_id, course_id, date, status, semester)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(record.course_id)
        .bind(record.date)
        .bind(record.status.as_str())
        .bind(&record.semester)
        .execute(&mut *tx)
        .await?;
        created.push(record);
    }

    tx.commit().await?;
    info!(count = created.len(), "recorded attendance");
    Ok(created)
}

pub async fn update_record(
    pool: &PgPool,
    id: i64,
    patch: &AttendancePatch,
) -> anyhow::Result<AttendanceRecord> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!("{SELECT_RECORDS} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound { id })?;
    let mut record = record_from_row(&row)?;
    patch.apply(&mut record);

    sqlx::query(
        r#"
        UPDATE college_attendance.records
        SET student_id = $2, course_id = $3, date = $4, status = $5, semester = $6
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.student_id)
    .bind(record.course_id)
    .bind(record.date)
    .bind(record.status.as_str())
    .bind(&record.semester)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record)
}

/// Flips present and absent in one statement, so concurrent toggles serialize
/// on the row lock instead of racing a read against a write.
pub async fn toggle_status(pool: &PgPool, id: i64) -> anyhow::Result<AttendanceRecord> {
    let row = sqlx::query(TOGGLE_STATUS)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound { id })?;
    record_from_row(&row)
}

pub async fn delete_record(pool: &PgPool, id: i64) -> anyhow::Result<AttendanceRecord> {
    let row = sqlx::query(
        r#"
        DELETE FROM college_attendance.records
        WHERE id = $1
        RETURNING id, student_id, course_id, date, status, semester
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound { id })?;

    info!(id, "deleted attendance record");
    record_from_row(&row)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let records = crate::import::read_csv(csv_path)?;
    let created = insert_bulk(pool, records, Utc::now().date_naive()).await?;
    Ok(created.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;

    #[test]
    fn toggle_is_a_single_returning_update() {
        let statement = TOGGLE_STATUS.trim();
        assert!(statement.starts_with("UPDATE college_attendance.records"));
        assert_eq!(statement.matches(';').count(), 0);
        assert!(!statement.contains("SELECT"));
        assert!(statement.contains("RETURNING id, student_id, course_id, date, status, semester"));
    }

    #[test]
    fn toggle_maps_each_status_to_its_opposite() {
        let present = AttendanceStatus::Present;
        let flip = format!(
            "CASE status WHEN '{}' THEN '{}' ELSE '{}' END",
            present.as_str(),
            present.toggled().as_str(),
            present.toggled().toggled().as_str()
        );
        assert!(TOGGLE_STATUS.contains(&flip));
    }
}
