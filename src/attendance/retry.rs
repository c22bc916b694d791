use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;

use crate::attendance::store::{RecordStore, StoreError};
use crate::database::models::{AttendanceRecord, LeaveRecord};

/// Capped exponential backoff for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Store wrapper that retries transient failures. The sqlx pool re-establishes
/// dropped connections on its own, so a retry is also a reconnect.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RecordStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient store failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for RetryingStore<S> {
    async fn find_attendance(
        &self,
        user_id: u64,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.run("find_attendance", || self.inner.find_attendance(user_id, guild_id, date))
            .await
    }

    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        self.run("upsert_attendance", || self.inner.upsert_attendance(record))
            .await
    }

    async fn list_attendance_for_day(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.run("list_attendance_for_day", || self.inner.list_attendance_for_day(guild_id, date))
            .await
    }

    async fn list_open_records(&self, guild_id: u64) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.run("list_open_records", || self.inner.list_open_records(guild_id))
            .await
    }

    async fn find_approved_leave(
        &self,
        subject_id: u64,
        guild_id: u64,
        day: NaiveDate,
    ) -> Result<Option<LeaveRecord>, StoreError> {
        self.run("find_approved_leave", || self.inner.find_approved_leave(subject_id, guild_id, day))
            .await
    }
}
