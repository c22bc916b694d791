use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Reverse;

use crate::database::models::AttendanceRecord;

/// Upper bound of the backward scan for consecutive absences, `day` itself included.
pub const MAX_ABSENCE_LOOKBACK_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub user_id: u64,
    pub total_minutes: i64,
    pub session_count: usize,
    pub earliest_check_in: Option<DateTime<Utc>>,
    pub latest_check_out: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    pub guild_id: u64,
    pub date: NaiveDate,
    /// Sorted by total minutes descending, then user id ascending.
    pub subjects: Vec<SubjectSummary>,
    pub total_minutes: i64,
    pub total_sessions: usize,
    pub earliest_check_in: Option<DateTime<Utc>>,
    pub latest_check_out: Option<DateTime<Utc>>,
}

impl DailyReport {
    /// Aggregates closed sessions only; sessions still open are left out of every total.
    pub fn from_records(guild_id: u64, date: NaiveDate, records: &[AttendanceRecord]) -> Self {
        let mut subjects: Vec<SubjectSummary> = records
            .iter()
            .filter(|record| record.guild_id == guild_id && record.date == date && record.is_present())
            .map(summarize)
            .collect();

        subjects.sort_by_key(|s| (Reverse(s.total_minutes), s.user_id));

        let total_minutes = subjects.iter().map(|s| s.total_minutes).sum();
        let total_sessions = subjects.iter().map(|s| s.session_count).sum();
        let earliest_check_in = subjects.iter().filter_map(|s| s.earliest_check_in).min();
        let latest_check_out = subjects.iter().filter_map(|s| s.latest_check_out).max();

        Self {
            guild_id,
            date,
            subjects,
            total_minutes,
            total_sessions,
            earliest_check_in,
            latest_check_out,
        }
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

fn summarize(record: &AttendanceRecord) -> SubjectSummary {
    let mut summary = SubjectSummary {
        user_id: record.user_id,
        total_minutes: 0,
        session_count: 0,
        earliest_check_in: None,
        latest_check_out: None,
    };

    for session in &record.sessions {
        let (Some(check_out), Some(minutes)) = (session.check_out, session.closed_minutes()) else {
            continue;
        };
        summary.total_minutes += minutes;
        summary.session_count += 1;
        summary.earliest_check_in = Some(match summary.earliest_check_in {
            Some(current) => current.min(session.check_in),
            None => session.check_in,
        });
        summary.latest_check_out = Some(match summary.latest_check_out {
            Some(current) => current.max(check_out),
            None => check_out,
        });
    }

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbsentSubject {
    pub user_id: u64,
    /// Days in a row, ending at the report day, without attendance or approved leave.
    pub consecutive_absent_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsenceReport {
    pub guild_id: u64,
    pub date: NaiveDate,
    pub total_eligible: usize,
    pub present_count: usize,
    /// Eligible subjects on approved leave who did not attend anyway.
    pub on_leave_count: usize,
    /// Longest streak first, then user id ascending.
    pub absent: Vec<AbsentSubject>,
}

impl AbsenceReport {
    pub fn new(
        guild_id: u64,
        date: NaiveDate,
        total_eligible: usize,
        present_count: usize,
        on_leave_count: usize,
        mut absent: Vec<AbsentSubject>,
    ) -> Self {
        absent.sort_by_key(|a| (Reverse(a.consecutive_absent_days), a.user_id));
        Self {
            guild_id,
            date,
            total_eligible,
            present_count,
            on_leave_count,
            absent,
        }
    }

    /// Present share of the subjects not on leave, in percent.
    /// `None` when nobody is expected because everyone eligible is on leave.
    pub fn attendance_rate(&self) -> Option<u8> {
        let expected = self.total_eligible.saturating_sub(self.on_leave_count);
        if expected == 0 {
            return None;
        }
        let rate = (self.present_count * 200 + expected) / (expected * 2);
        Some(rate.min(100) as u8)
    }
}
