use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::attendance::report::{AbsenceReport, DailyReport};

#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceEvent {
    CheckIn {
        user_id: u64,
        guild_id: u64,
        at: DateTime<Utc>,
        session_index: usize,
    },
    CheckOut {
        user_id: u64,
        guild_id: u64,
        at: DateTime<Utc>,
        check_in: DateTime<Utc>,
        duration_minutes: i64,
        /// Moderator who closed the session on the user's behalf.
        forced_by: Option<u64>,
    },
    DailyReport(DailyReport),
    AbsenceReport(AbsenceReport),
}

impl AttendanceEvent {
    pub fn guild_id(&self) -> u64 {
        match self {
            AttendanceEvent::CheckIn { guild_id, .. } | AttendanceEvent::CheckOut { guild_id, .. } => *guild_id,
            AttendanceEvent::DailyReport(report) => report.guild_id,
            AttendanceEvent::AbsenceReport(report) => report.guild_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceEvent::CheckIn { .. } => "check_in",
            AttendanceEvent::CheckOut { .. } => "check_out",
            AttendanceEvent::DailyReport(_) => "daily_report",
            AttendanceEvent::AbsenceReport(_) => "absence_report",
        }
    }
}

/// Best-effort outlet for attendance events. Callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: &AttendanceEvent) -> anyhow::Result<()>;
}
