use thiserror::Error;

/// Failures raised by attendance record stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Point lookup, update or delete on an id the store does not hold
    #[error("attendance record {id} not found")]
    NotFound { id: i64 },

    /// Seed data carried the same id twice
    #[error("attendance record {id} already exists")]
    DuplicateId { id: i64 },

    /// No id above the current maximum is representable
    #[error("attendance ids exhausted after {last}")]
    IdSpaceExhausted { last: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record() {
        assert_eq!(
            StoreError::NotFound { id: 12 }.to_string(),
            "attendance record 12 not found"
        );
        assert_eq!(
            StoreError::DuplicateId { id: 3 }.to_string(),
            "attendance record 3 already exists"
        );
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = StoreError::NotFound { id: 5 }.into();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound { id: 5 })
        );
    }
}
