use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::attendance::clock::Clock;
use crate::attendance::error::AttendanceError;
use crate::attendance::guard::{ConcurrencyGuard, UserLock};
use crate::attendance::notify::{AttendanceEvent, NotificationSink};
use crate::attendance::report::{AbsenceReport, AbsentSubject, DailyReport, MAX_ABSENCE_LOOKBACK_DAYS};
use crate::attendance::store::{RecordStore, StoreError};
use crate::database::models::AttendanceRecord;

/// Result of closing every open session of a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverSummary {
    pub closed: usize,
    /// Users skipped because another operation held their lock.
    pub skipped: usize,
}

pub struct AttendanceTracker {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    guard: Arc<ConcurrencyGuard>,
}

impl AttendanceTracker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        guard: Arc<ConcurrencyGuard>,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            guard,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Opens a new session for today. The lock is held until this returns.
    pub async fn check_in(
        &self,
        user_id: u64,
        guild_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let _lock = self.lock(user_id)?;
        let date = self.clock.day_of(now);

        let mut record = self
            .store
            .find_attendance(user_id, guild_id, date)
            .await
            .map_err(|e| self.store_failure("check-in", user_id, guild_id, e))?
            .unwrap_or_else(|| AttendanceRecord::new(user_id, guild_id, date));

        if let Some(open) = record.open_session() {
            tracing::debug!(user_id, guild_id, %date, "Check-in rejected: session already open");
            return Err(AttendanceError::SessionAlreadyOpen { since: open.check_in });
        }

        let session_index = record.push_session(now);
        let record = self
            .store
            .upsert_attendance(&record)
            .await
            .map_err(|e| self.store_failure("check-in", user_id, guild_id, e))?;

        tracing::info!(user_id, guild_id, %date, session_index, "Checked in");

        self.notify(&AttendanceEvent::CheckIn {
            user_id,
            guild_id,
            at: now,
            session_index,
        })
        .await;

        Ok(record)
    }

    /// Closes today's open session.
    pub async fn check_out(
        &self,
        user_id: u64,
        guild_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let _lock = self.lock(user_id)?;
        let date = self.clock.day_of(now);
        self.close_session(user_id, guild_id, date, now, None).await
    }

    /// Check-out performed by a moderator on behalf of `user_id`.
    pub async fn force_check_out(
        &self,
        user_id: u64,
        guild_id: u64,
        now: DateTime<Utc>,
        moderator_id: u64,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let _lock = self.lock(user_id)?;
        let date = self.clock.day_of(now);
        let record = self
            .close_session(user_id, guild_id, date, now, Some(moderator_id))
            .await?;
        tracing::info!(user_id, guild_id, moderator_id, "Forced check-out");
        Ok(record)
    }

    /// Closes every session of `date` still open at `at`. Users with an operation
    /// in flight are skipped rather than waited for.
    pub async fn close_open_sessions(
        &self,
        guild_id: u64,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<RolloverSummary, AttendanceError> {
        let records = self
            .store
            .list_attendance_for_day(guild_id, date)
            .await
            .map_err(|e| self.store_failure("rollover", 0, guild_id, e))?;

        let mut summary = RolloverSummary::default();
        for record in records.iter().filter(|r| r.has_open_session()) {
            let Some(_lock) = self.guard.try_acquire(record.user_id) else {
                tracing::info!(user_id = record.user_id, guild_id, "Rollover skipped: operation in progress");
                summary.skipped += 1;
                continue;
            };
            match self.close_session(record.user_id, guild_id, date, at, None).await {
                Ok(_) => summary.closed += 1,
                // Closed concurrently between the listing and the lock.
                Err(AttendanceError::NoOpenSession) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!(guild_id, %date, closed = summary.closed, skipped = summary.skipped, "Rollover finished");
        Ok(summary)
    }

    /// The caller's record for the reporting day containing `now`.
    pub async fn record_for(
        &self,
        user_id: u64,
        guild_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let date = self.clock.day_of(now);
        self.store
            .find_attendance(user_id, guild_id, date)
            .await
            .map_err(|e| self.store_failure("status", user_id, guild_id, e))
    }

    pub async fn open_sessions(&self, guild_id: u64) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.store
            .list_open_records(guild_id)
            .await
            .map_err(|e| self.store_failure("open-sessions", 0, guild_id, e))
    }

    pub async fn daily_report(&self, guild_id: u64, date: NaiveDate) -> Result<DailyReport, AttendanceError> {
        let records = self
            .store
            .list_attendance_for_day(guild_id, date)
            .await
            .map_err(|e| self.store_failure("daily-report", 0, guild_id, e))?;
        Ok(DailyReport::from_records(guild_id, date, &records))
    }

    pub async fn absence_report(
        &self,
        guild_id: u64,
        date: NaiveDate,
        eligible: &BTreeSet<u64>,
    ) -> Result<AbsenceReport, AttendanceError> {
        self.build_absence_report(guild_id, date, eligible)
            .await
            .map_err(|e| self.store_failure("absence-report", 0, guild_id, e))
    }

    async fn build_absence_report(
        &self,
        guild_id: u64,
        date: NaiveDate,
        eligible: &BTreeSet<u64>,
    ) -> Result<AbsenceReport, StoreError> {
        let present: HashSet<u64> = self
            .store
            .list_attendance_for_day(guild_id, date)
            .await?
            .into_iter()
            .filter(AttendanceRecord::is_present)
            .map(|r| r.user_id)
            .collect();

        let mut present_count = 0;
        let mut on_leave_count = 0;
        let mut absent = Vec::new();

        for &user_id in eligible {
            if present.contains(&user_id) {
                present_count += 1;
                continue;
            }
            if self.store.find_approved_leave(user_id, guild_id, date).await?.is_some() {
                on_leave_count += 1;
                continue;
            }
            let consecutive_absent_days = self.consecutive_absent_days(user_id, guild_id, date).await?;
            absent.push(AbsentSubject {
                user_id,
                consecutive_absent_days,
            });
        }

        Ok(AbsenceReport::new(
            guild_id,
            date,
            eligible.len(),
            present_count,
            on_leave_count,
            absent,
        ))
    }

    /// Counts `date` itself plus each earlier day without attendance or approved
    /// leave, stopping at the first covered day or at the lookback cap.
    async fn consecutive_absent_days(&self, user_id: u64, guild_id: u64, date: NaiveDate) -> Result<u32, StoreError> {
        let mut count = 1;
        while count < MAX_ABSENCE_LOOKBACK_DAYS {
            let Some(day) = date.checked_sub_days(Days::new(u64::from(count))) else {
                break;
            };
            if self.is_accounted_for(user_id, guild_id, day).await? {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    async fn is_accounted_for(&self, user_id: u64, guild_id: u64, day: NaiveDate) -> Result<bool, StoreError> {
        let attended = self
            .store
            .find_attendance(user_id, guild_id, day)
            .await?
            .is_some_and(|r| r.is_present());
        if attended {
            return Ok(true);
        }
        Ok(self
            .store
            .find_approved_leave(user_id, guild_id, day)
            .await?
            .is_some())
    }

    /// Emits an event, logging instead of failing.
    pub async fn notify(&self, event: &AttendanceEvent) {
        if let Err(e) = self.notifier.emit(event).await {
            tracing::warn!(kind = event.kind(), guild_id = event.guild_id(), "Failed to deliver notification: {:?}", e);
        }
    }

    async fn close_session(
        &self,
        user_id: u64,
        guild_id: u64,
        date: NaiveDate,
        now: DateTime<Utc>,
        forced_by: Option<u64>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let mut record = self
            .store
            .find_attendance(user_id, guild_id, date)
            .await
            .map_err(|e| self.store_failure("check-out", user_id, guild_id, e))?
            .ok_or(AttendanceError::NoOpenSession)?;

        let Some(session) = record.open_session_mut() else {
            tracing::debug!(user_id, guild_id, %date, "Check-out rejected: no open session");
            return Err(AttendanceError::NoOpenSession);
        };
        let check_in = session.check_in;
        let close = session.close(now);
        if close.clock_skew {
            tracing::warn!(
                user_id,
                guild_id,
                %check_in,
                %now,
                clock_skew = true,
                "Check-out earlier than check-in, duration clamped to 0"
            );
        }

        let record = self
            .store
            .upsert_attendance(&record)
            .await
            .map_err(|e| self.store_failure("check-out", user_id, guild_id, e))?;

        tracing::info!(user_id, guild_id, %date, duration_minutes = close.duration_minutes, "Checked out");

        self.notify(&AttendanceEvent::CheckOut {
            user_id,
            guild_id,
            at: now,
            check_in,
            duration_minutes: close.duration_minutes,
            forced_by,
        })
        .await;

        Ok(record)
    }

    fn lock(&self, user_id: u64) -> Result<UserLock, AttendanceError> {
        self.guard.try_acquire(user_id).ok_or_else(|| {
            tracing::debug!(user_id, "Attendance operation already in progress");
            AttendanceError::AlreadyInProgress
        })
    }

    fn store_failure(&self, operation: &str, user_id: u64, guild_id: u64, e: StoreError) -> AttendanceError {
        tracing::error!(operation, user_id, guild_id, "Attendance store unavailable: {}", e);
        AttendanceError::StoreUnavailable(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::testing::{FailingSink, FixedClock, MemoryStore, RecordingSink};
    use crate::database::models::{LeaveRecord, LeaveStatus, Session};
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    const USER: u64 = 100;
    const GUILD: u64 = 200;

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        guard: Arc<ConcurrencyGuard>,
        tracker: AttendanceTracker,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::default());
        let sink = Arc::new(RecordingSink::default());
        let guard = ConcurrencyGuard::new();
        let clock = Arc::new(FixedClock::at(utc(2024, 5, 1, 6, 0, 0)));
        let tracker = AttendanceTracker::new(store.clone(), clock, sink.clone(), guard.clone());
        Harness {
            store,
            sink,
            guard,
            tracker,
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 06:00 UTC is 09:00 at +03:00
    fn nine_am() -> DateTime<Utc> {
        utc(2024, 5, 1, 6, 0, 0)
    }

    fn approved_leave(subject_id: u64, start: NaiveDate, end: NaiveDate) -> LeaveRecord {
        LeaveRecord {
            id: 1,
            subject_id,
            guild_id: GUILD,
            start_date: start,
            end_date: end,
            reason: "vacation".to_string(),
            status: LeaveStatus::Approved,
            created_at: nine_am(),
        }
    }

    fn attended(user_id: u64, day: NaiveDate) -> AttendanceRecord {
        let mut record = AttendanceRecord::new(user_id, GUILD, day);
        record.sessions.push(Session::open(nine_am()));
        record
    }

    #[tokio::test]
    async fn check_in_creates_record_with_open_session() {
        let h = harness();

        let record = h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();

        assert_eq!(record.date, date(2024, 5, 1));
        assert_eq!(record.sessions, vec![Session::open(nine_am())]);
        assert_eq!(h.store.get(USER, GUILD, date(2024, 5, 1)), Some(record));
        assert_eq!(
            h.sink.events(),
            vec![AttendanceEvent::CheckIn {
                user_id: USER,
                guild_id: GUILD,
                at: nine_am(),
                session_index: 0,
            }]
        );
        assert!(!h.guard.is_locked(USER));
    }

    #[tokio::test]
    async fn second_check_in_is_rejected_without_mutation() {
        let h = harness();
        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();

        let err = h
            .tracker
            .check_in(USER, GUILD, nine_am() + chrono::Duration::minutes(5))
            .await
            .unwrap_err();

        assert!(matches!(err, AttendanceError::SessionAlreadyOpen { since } if since == nine_am()));
        let stored = h.store.get(USER, GUILD, date(2024, 5, 1)).unwrap();
        assert_eq!(stored.sessions.len(), 1);
        assert_eq!(h.store.upserts.load(Ordering::SeqCst), 1);
        assert!(!h.guard.is_locked(USER));
    }

    #[tokio::test]
    async fn check_out_seals_session_with_rounded_duration() {
        let h = harness();
        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();
        let out = nine_am() + chrono::Duration::seconds(90);

        let record = h.tracker.check_out(USER, GUILD, out).await.unwrap();

        let session = &record.sessions[0];
        assert_eq!(session.check_in, nine_am());
        assert_eq!(session.check_out, Some(out));
        assert_eq!(session.duration_minutes, Some(2));
        assert_eq!(
            h.sink.events().last(),
            Some(&AttendanceEvent::CheckOut {
                user_id: USER,
                guild_id: GUILD,
                at: out,
                check_in: nine_am(),
                duration_minutes: 2,
                forced_by: None,
            })
        );
    }

    #[tokio::test]
    async fn check_out_without_record_or_open_session_fails() {
        let h = harness();
        let err = h.tracker.check_out(USER, GUILD, nine_am()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenSession));

        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();
        h.tracker
            .check_out(USER, GUILD, nine_am() + chrono::Duration::hours(1))
            .await
            .unwrap();
        let err = h
            .tracker
            .check_out(USER, GUILD, nine_am() + chrono::Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenSession));
        assert!(!h.guard.is_locked(USER));
    }

    #[tokio::test]
    async fn empty_record_counts_as_no_open_session() {
        let h = harness();
        h.store.insert(AttendanceRecord::new(USER, GUILD, date(2024, 5, 1)));
        let err = h.tracker.check_out(USER, GUILD, nine_am()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenSession));
    }

    #[tokio::test]
    async fn alternating_calls_never_leave_two_open_sessions() {
        let h = harness();
        let mut now = nine_am();
        for step in 0..12 {
            now += chrono::Duration::minutes(7);
            // Irregular pattern with repeated check-ins and check-outs.
            let _ = if step % 3 == 0 {
                h.tracker.check_out(USER, GUILD, now).await
            } else {
                h.tracker.check_in(USER, GUILD, now).await
            };
            let record = h.store.get(USER, GUILD, date(2024, 5, 1)).unwrap_or_else(|| {
                AttendanceRecord::new(USER, GUILD, date(2024, 5, 1))
            });
            let open = record.sessions.iter().filter(|s| s.is_open()).count();
            assert!(open <= 1);
            assert!(record.sessions.iter().rev().skip(1).all(|s| !s.is_open()));
        }
    }

    #[tokio::test]
    async fn concurrent_check_ins_yield_one_success() {
        let h = harness();

        let (first, second) = tokio::join!(
            h.tracker.check_in(USER, GUILD, nine_am()),
            h.tracker.check_in(USER, GUILD, nine_am()),
        );

        let results = [first, second];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(AttendanceError::AlreadyInProgress) | Err(AttendanceError::SessionAlreadyOpen { .. })
        )));
        assert_eq!(h.store.get(USER, GUILD, date(2024, 5, 1)).unwrap().sessions.len(), 1);
        assert!(!h.guard.is_locked(USER));
    }

    #[tokio::test]
    async fn check_in_and_check_out_share_the_lock() {
        let h = harness();
        let _held = h.guard.try_acquire(USER).unwrap();

        let err = h.tracker.check_out(USER, GUILD, nine_am()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyInProgress));
        // Same user in another guild is serialized too.
        let err = h.tracker.check_in(USER, GUILD + 1, nine_am()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyInProgress));
        // The foreign holder keeps its lock.
        assert!(h.guard.is_locked(USER));
    }

    #[tokio::test]
    async fn store_failure_releases_lock() {
        let h = harness();
        h.store.fail_writes.store(true, Ordering::SeqCst);

        let err = h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap_err();

        assert!(matches!(err, AttendanceError::StoreUnavailable(_)));
        assert!(!h.guard.is_locked(USER));
        assert!(h.sink.events().is_empty());

        h.store.fail_writes.store(false, Ordering::SeqCst);
        assert!(h.tracker.check_in(USER, GUILD, nine_am()).await.is_ok());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_operation() {
        let store = Arc::new(MemoryStore::default());
        let tracker = AttendanceTracker::new(
            store.clone(),
            Arc::new(FixedClock::at(nine_am())),
            Arc::new(FailingSink),
            ConcurrencyGuard::new(),
        );

        tracker.check_in(USER, GUILD, nine_am()).await.unwrap();
        let record = tracker
            .check_out(USER, GUILD, nine_am() + chrono::Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(record.sessions[0].duration_minutes, Some(30));
        assert_eq!(store.get(USER, GUILD, date(2024, 5, 1)), Some(record));
    }

    #[tokio::test]
    async fn day_boundary_follows_reporting_offset() {
        let h = harness();
        // 21:30 UTC on May 1st is 00:30 on May 2nd at +03:00
        let late = utc(2024, 5, 1, 21, 30, 0);

        let record = h.tracker.check_in(USER, GUILD, late).await.unwrap();

        assert_eq!(record.date, date(2024, 5, 2));
    }

    #[tokio::test]
    async fn new_day_starts_a_fresh_record() {
        let h = harness();
        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();
        let next_day = nine_am() + chrono::Duration::days(1);

        let record = h.tracker.check_in(USER, GUILD, next_day).await.unwrap();

        assert_eq!(record.date, date(2024, 5, 2));
        assert_eq!(record.sessions.len(), 1);
        // Yesterday's session is not reachable from today's check-out path.
        assert!(h.store.get(USER, GUILD, date(2024, 5, 1)).unwrap().has_open_session());
    }

    #[tokio::test]
    async fn clock_skew_clamps_duration() {
        let h = harness();
        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();

        let record = h
            .tracker
            .check_out(USER, GUILD, nine_am() - chrono::Duration::seconds(20))
            .await
            .unwrap();

        assert_eq!(record.sessions[0].duration_minutes, Some(0));
        assert_eq!(record.sessions[0].check_out, Some(nine_am()));
    }

    #[tokio::test]
    async fn force_check_out_records_moderator() {
        let h = harness();
        h.tracker.check_in(USER, GUILD, nine_am()).await.unwrap();

        h.tracker
            .force_check_out(USER, GUILD, nine_am() + chrono::Duration::minutes(10), 999)
            .await
            .unwrap();

        assert!(matches!(
            h.sink.events().last(),
            Some(AttendanceEvent::CheckOut { forced_by: Some(999), duration_minutes: 10, .. })
        ));
    }

    #[tokio::test]
    async fn rollover_closes_open_sessions_and_skips_locked_users() {
        let h = harness();
        h.tracker.check_in(1, GUILD, nine_am()).await.unwrap();
        h.tracker.check_in(2, GUILD, nine_am()).await.unwrap();
        h.tracker.check_in(3, GUILD, nine_am()).await.unwrap();
        h.tracker
            .check_out(3, GUILD, nine_am() + chrono::Duration::hours(1))
            .await
            .unwrap();
        let _busy = h.guard.try_acquire(2).unwrap();

        let end_of_day = utc(2024, 5, 1, 20, 59, 0);
        let summary = h
            .tracker
            .close_open_sessions(GUILD, date(2024, 5, 1), end_of_day)
            .await
            .unwrap();

        assert_eq!(summary, RolloverSummary { closed: 1, skipped: 1 });
        let closed = h.store.get(1, GUILD, date(2024, 5, 1)).unwrap();
        assert_eq!(closed.sessions[0].check_out, Some(end_of_day));
        assert!(h.store.get(2, GUILD, date(2024, 5, 1)).unwrap().has_open_session());
    }

    #[tokio::test]
    async fn open_sessions_lists_records_across_days() {
        let h = harness();
        h.tracker.check_in(1, GUILD, nine_am()).await.unwrap();
        h.tracker
            .check_in(2, GUILD, nine_am() + chrono::Duration::days(1))
            .await
            .unwrap();
        h.tracker.check_in(3, GUILD + 1, nine_am()).await.unwrap();

        let open = h.tracker.open_sessions(GUILD).await.unwrap();

        let users: Vec<u64> = open.iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec![1, 2]);
    }

    #[tokio::test]
    async fn daily_report_on_empty_day() {
        let h = harness();
        let report = h.tracker.daily_report(GUILD, date(2024, 5, 1)).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.total_minutes, 0);
        assert_eq!(report.total_sessions, 0);
    }

    #[tokio::test]
    async fn daily_report_surfaces_store_failure() {
        let h = harness();
        h.store.fail_reads.store(true, Ordering::SeqCst);
        let err = h.tracker.daily_report(GUILD, date(2024, 5, 1)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn absence_report_example_scenario() {
        let h = harness();
        let (a, b, c) = (1, 2, 3);
        let day = date(2024, 5, 1);
        h.tracker.check_in(a, GUILD, nine_am()).await.unwrap();
        h.store.add_leave(approved_leave(b, day, day));
        // C attended two days ago, so today's streak is two days.
        h.store.insert(attended(c, date(2024, 4, 29)));

        let eligible = BTreeSet::from([a, b, c]);
        let report = h.tracker.absence_report(GUILD, day, &eligible).await.unwrap();

        assert_eq!(report.total_eligible, 3);
        assert_eq!(report.present_count, 1);
        assert_eq!(report.on_leave_count, 1);
        assert_eq!(
            report.absent,
            vec![AbsentSubject {
                user_id: c,
                consecutive_absent_days: 2
            }]
        );
    }

    #[tokio::test]
    async fn open_session_counts_as_present() {
        let h = harness();
        h.tracker.check_in(1, GUILD, nine_am()).await.unwrap();

        let report = h
            .tracker
            .absence_report(GUILD, date(2024, 5, 1), &BTreeSet::from([1]))
            .await
            .unwrap();

        assert_eq!(report.present_count, 1);
        assert!(report.absent.is_empty());
    }

    #[tokio::test]
    async fn approved_leave_beats_absence_but_presence_wins_counting() {
        let h = harness();
        let day = date(2024, 5, 1);
        h.store.add_leave(approved_leave(1, day, day));
        h.store.add_leave(approved_leave(2, day, day));
        h.tracker.check_in(2, GUILD, nine_am()).await.unwrap();

        let report = h
            .tracker
            .absence_report(GUILD, day, &BTreeSet::from([1, 2]))
            .await
            .unwrap();

        assert!(report.absent.is_empty());
        assert_eq!(report.present_count, 1);
        assert_eq!(report.on_leave_count, 1);
    }

    #[tokio::test]
    async fn pending_leave_does_not_exempt() {
        let h = harness();
        let day = date(2024, 5, 1);
        let mut leave = approved_leave(1, day, day);
        leave.status = LeaveStatus::Pending;
        h.store.add_leave(leave);
        // Present yesterday, so only today counts.
        h.store.insert(attended(1, date(2024, 4, 30)));

        let report = h.tracker.absence_report(GUILD, day, &BTreeSet::from([1])).await.unwrap();

        assert_eq!(report.on_leave_count, 0);
        assert_eq!(report.absent[0].consecutive_absent_days, 1);
    }

    #[tokio::test]
    async fn streak_stops_at_leave_and_is_capped() {
        let h = harness();
        let day = date(2024, 5, 1);
        // Leave ended three days before the report day.
        h.store.add_leave(approved_leave(1, date(2024, 4, 20), date(2024, 4, 28)));

        let report = h
            .tracker
            .absence_report(GUILD, day, &BTreeSet::from([1, 2]))
            .await
            .unwrap();

        // User 2 never attended: the scan stops at the cap.
        assert_eq!(
            report.absent,
            vec![
                AbsentSubject { user_id: 2, consecutive_absent_days: MAX_ABSENCE_LOOKBACK_DAYS },
                AbsentSubject { user_id: 1, consecutive_absent_days: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn empty_record_is_not_presence() {
        let h = harness();
        let day = date(2024, 5, 1);
        h.store.insert(AttendanceRecord::new(1, GUILD, day));
        h.store.insert(attended(1, date(2024, 4, 30)));

        let report = h.tracker.absence_report(GUILD, day, &BTreeSet::from([1])).await.unwrap();

        assert_eq!(report.present_count, 0);
        assert_eq!(report.absent[0].consecutive_absent_days, 1);
    }
}
