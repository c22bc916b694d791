use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::database::models::{AttendanceRecord, LeaveRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A persisted record violates the record invariants.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Failures worth retrying: lost connections, pool exhaustion, busy/locked database.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Io(_))
            | StoreError::Database(sqlx::Error::PoolTimedOut)
            | StoreError::Database(sqlx::Error::WorkerCrashed) => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                db.code().is_some_and(|code| is_busy_or_locked(&code))
            }
            _ => false,
        }
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including extended codes such as
/// SQLITE_BUSY_SNAPSHOT (517). The primary code is the low byte.
fn is_busy_or_locked(code: &str) -> bool {
    code.parse::<i64>()
        .is_ok_and(|code| matches!(code & 0xff, 5 | 6))
}

/// Persistence of attendance and leave records.
///
/// `upsert_attendance` must be atomic at the `(user_id, guild_id, date)` key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_attendance(
        &self,
        user_id: u64,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError>;

    /// All records of a guild for one day, ordered by user id.
    async fn list_attendance_for_day(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Records of a guild, on any day, whose last session is still open.
    async fn list_open_records(&self, guild_id: u64) -> Result<Vec<AttendanceRecord>, StoreError>;

    async fn find_approved_leave(
        &self,
        subject_id: u64,
        guild_id: u64,
        day: NaiveDate,
    ) -> Result<Option<LeaveRecord>, StoreError>;
}
