use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter};

pub type Clock = fn() -> NaiveDate;

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Ids for `count` new records following `current_max`. Empty stores start at 1.
pub fn plan_ids(current_max: Option<i64>, count: usize) -> Result<Vec<i64>, StoreError> {
    let mut last = current_max.unwrap_or(0);
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        last = last
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted { last })?;
        ids.push(last);
    }
    Ok(ids)
}

/// In-memory attendance record store keyed by id.
///
/// Ids only ever grow (new id = current max + 1), so iteration order is
/// also creation order.
#[derive(Debug, Clone)]
pub struct AttendanceStore {
    records: BTreeMap<i64, AttendanceRecord>,
    clock: Clock,
}

impl Default for AttendanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AttendanceStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            clock: utc_today,
        }
    }

    pub fn with_records(
        records: impl IntoIterator<Item = AttendanceRecord>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for record in records {
            if store.records.contains_key(&record.id) {
                return Err(StoreError::DuplicateId { id: record.id });
            }
            store.records.insert(record.id, record);
        }
        Ok(store)
    }

    /// Replaces the date source used for records created without a date.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned copy of every record, ordered by id.
    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, id: i64) -> Result<AttendanceRecord, StoreError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    pub fn find(&self, filter: &RecordFilter) -> Vec<AttendanceRecord> {
        self.records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    pub fn create(&mut self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let mut created = self.create_bulk(vec![record])?;
        Ok(created.remove(0))
    }

    /// Appends every record or none of them. Returned records keep input order.
    pub fn create_bulk(
        &mut self,
        records: Vec<NewAttendanceRecord>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let current_max = self.records.keys().next_back().copied();
        let ids = plan_ids(current_max, records.len())?;
        let today = (self.clock)();

        let created: Vec<AttendanceRecord> = records
            .into_iter()
            .zip(ids)
            .map(|(record, id)| record.into_record(id, today))
            .collect();

        for record in &created {
            self.records.insert(record.id, record.clone());
        }

        info!(count = created.len(), "recorded attendance");
        Ok(created)
    }

    pub fn update(
        &mut self,
        id: i64,
        patch: &AttendancePatch,
    ) -> Result<AttendanceRecord, StoreError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;
        patch.apply(record);
        debug!(id, status = %record.status, "updated attendance record");
        Ok(record.clone())
    }

    pub fn toggle_status(&mut self, id: i64) -> Result<AttendanceRecord, StoreError> {
        let status = self.get(id)?.status.toggled();
        self.update(id, &AttendancePatch::status(status))
    }

    pub fn delete(&mut self, id: i64) -> Result<AttendanceRecord, StoreError> {
        let removed = self
            .records
            .remove(&id)
            .ok_or(StoreError::NotFound { id })?;
        info!(id, "deleted attendance record");
        Ok(removed)
    }
}
