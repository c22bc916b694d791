use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::time::rounded_minutes_between;

/// One check-in/check-out interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

/// Outcome of sealing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClose {
    pub duration_minutes: i64,
    /// The closing time was earlier than the check-in and got clamped.
    pub clock_skew: bool,
}

impl Session {
    pub fn open(check_in: DateTime<Utc>) -> Self {
        Self {
            check_in,
            check_out: None,
            duration_minutes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    /// Seals the session at `at`. A closing time before the check-in is clamped to the
    /// check-in so that `check_out >= check_in` always holds.
    pub fn close(&mut self, at: DateTime<Utc>) -> SessionClose {
        let clock_skew = at < self.check_in;
        let check_out = if clock_skew { self.check_in } else { at };
        let duration_minutes = rounded_minutes_between(self.check_in, check_out);

        self.check_out = Some(check_out);
        self.duration_minutes = Some(duration_minutes);

        SessionClose {
            duration_minutes,
            clock_skew,
        }
    }

    /// Duration of a closed session; `None` while the session is still open.
    pub fn closed_minutes(&self) -> Option<i64> {
        self.check_out
            .map(|out| self.duration_minutes.unwrap_or_else(|| rounded_minutes_between(self.check_in, out)))
    }
}

/// All sessions of one user in one guild on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub date: NaiveDate,
    pub sessions: Vec<Session>,
}

impl AttendanceRecord {
    pub fn new(user_id: u64, guild_id: u64, date: NaiveDate) -> Self {
        Self {
            user_id,
            guild_id,
            date,
            sessions: Vec::new(),
        }
    }

    pub fn last_session(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// The open session, if any. Only the last session may be open.
    pub fn open_session(&self) -> Option<&Session> {
        self.sessions.last().filter(|s| s.is_open())
    }

    pub fn open_session_mut(&mut self) -> Option<&mut Session> {
        self.sessions.last_mut().filter(|s| s.is_open())
    }

    pub fn has_open_session(&self) -> bool {
        self.open_session().is_some()
    }

    /// Appends an open session and returns its index.
    pub fn push_session(&mut self, check_in: DateTime<Utc>) -> usize {
        self.sessions.push(Session::open(check_in));
        self.sessions.len() - 1
    }

    pub fn is_present(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// Checks the persisted shape and fills in missing derived durations.
    pub fn normalize(mut self) -> Result<Self, String> {
        let open_count = self.sessions.iter().filter(|s| s.is_open()).count();
        if open_count > 1 {
            return Err(format!(
                "record {}/{}/{} has {} open sessions",
                self.user_id, self.guild_id, self.date, open_count
            ));
        }
        if open_count == 1 && !self.sessions.last().is_some_and(Session::is_open) {
            return Err(format!(
                "record {}/{}/{} has an open session before a closed one",
                self.user_id, self.guild_id, self.date
            ));
        }

        for session in &mut self.sessions {
            if let Some(out) = session.check_out {
                if out < session.check_in {
                    return Err(format!(
                        "record {}/{}/{} has a session ending before it starts",
                        self.user_id, self.guild_id, self.date
                    ));
                }
                if session.duration_minutes.is_none_or(|m| m < 0) {
                    session.duration_minutes = Some(rounded_minutes_between(session.check_in, out));
                }
            } else {
                session.duration_minutes = None;
            }
        }

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Completed => "completed",
        }
    }

    /// Reviews only move a pending request forward.
    pub fn can_transition_to(&self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
                | (LeaveStatus::Approved, LeaveStatus::Completed)
        )
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeaveStatus::Pending),
            "approved" => Ok(LeaveStatus::Approved),
            "rejected" => Ok(LeaveStatus::Rejected),
            "completed" => Ok(LeaveStatus::Completed),
            other => Err(format!("invalid leave status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRecord {
    pub id: i64,
    pub subject_id: u64,
    pub guild_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,
}

impl LeaveRecord {
    /// Inclusive on both ends.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    pub fn exempts(&self, day: NaiveDate) -> bool {
        self.status == LeaveStatus::Approved && self.covers(day)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub tracked_role_id: Option<u64>,
    pub log_channel_id: Option<u64>,
    /// Role held by members while they are checked in.
    pub presence_role_id: Option<u64>,
}
