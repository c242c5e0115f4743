use chrono::Utc;
use sqlx::PgPool;

use crate::db;
use crate::models::{AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter};
use crate::store::AttendanceStore;

/// Where attendance records live for one CLI invocation.
pub enum Backend {
    Memory(AttendanceStore),
    Postgres(PgPool),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    pub async fn snapshot(&self) -> anyhow::Result<Vec<AttendanceRecord>> {
        self.find(&RecordFilter::default()).await
    }

    pub async fn find(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AttendanceRecord>> {
        match self {
            Backend::Memory(store) => Ok(store.find(filter)),
            Backend::Postgres(pool) => db::fetch_records(pool, filter).await,
        }
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<AttendanceRecord> {
        match self {
            Backend::Memory(store) => Ok(store.get(id)?),
            Backend::Postgres(pool) => db::fetch_record(pool, id).await,
        }
    }

    pub async fn create_bulk(
        &mut self,
        records: Vec<NewAttendanceRecord>,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        match self {
            Backend::Memory(store) => Ok(store.create_bulk(records)?),
            Backend::Postgres(pool) => {
                db::insert_bulk(pool, records, Utc::now().date_naive()).await
            }
        }
    }

    pub async fn update(
        &mut self,
        id: i64,
        patch: &AttendancePatch,
    ) -> anyhow::Result<AttendanceRecord> {
        match self {
            Backend::Memory(store) => Ok(store.update(id, patch)?),
            Backend::Postgres(pool) => db::update_record(pool, id, patch).await,
        }
    }

    pub async fn toggle_status(&mut self, id: i64) -> anyhow::Result<AttendanceRecord> {
        match self {
            Backend::Memory(store) => Ok(store.toggle_status(id)?),
            Backend::Postgres(pool) => db::toggle_status(pool, id).await,
        }
    }

    pub async fn delete(&mut self, id: i64) -> anyhow::Result<AttendanceRecord> {
        match self {
            Backend::Memory(store) => Ok(store.delete(id)?),
            Backend::Postgres(pool) => db::delete_record(pool, id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::fixtures;
    use crate::models::AttendanceStatus;

    fn memory() -> Backend {
        let store = AttendanceStore::with_records(fixtures::seed_records().unwrap()).unwrap();
        Backend::Memory(store)
    }

    #[tokio::test]
    async fn memory_snapshot_returns_every_record() {
        let backend = memory();
        assert_eq!(backend.name(), "memory");
        assert_eq!(backend.snapshot().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn memory_writes_are_visible_to_later_reads() {
        let mut backend = memory();
        let created = backend
            .create_bulk(vec![NewAttendanceRecord {
                student_id: 4,
                course_id: 3,
                date: None,
                status: AttendanceStatus::Absent,
                semester: "Fall 2024".to_string(),
            }])
            .await
            .unwrap();
        assert_eq!(created[0].id, 21);

        let toggled = backend.toggle_status(21).await.unwrap();
        assert_eq!(toggled.status, AttendanceStatus::Present);

        let err = backend.toggle_status(999).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound { id: 999 })
        );

        let removed = backend.delete(21).await.unwrap();
        assert_eq!(removed.status, AttendanceStatus::Present);
        assert_eq!(backend.snapshot().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn missing_ids_surface_store_errors() {
        let mut backend = memory();
        let err = backend.delete(500).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound { id: 500 })
        );
    }
}
