use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::attendance::store::StoreError;

/// Failures of the attendance operations.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Another check-in/check-out for the same user is in flight. Retry later.
    #[error("an attendance operation for this user is already in progress")]
    AlreadyInProgress,
    #[error("an attendance session is already open since {since}")]
    SessionAlreadyOpen { since: DateTime<Utc> },
    #[error("no open attendance session")]
    NoOpenSession,
    /// The store failed after its own retries.
    #[error("attendance store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl AttendanceError {
    /// Rejections caused by the user's own state rather than by the system.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            AttendanceError::SessionAlreadyOpen { .. } | AttendanceError::NoOpenSession
        )
    }
}
