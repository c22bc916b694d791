//! In-memory collaborators for exercising the tracker without Discord or SQLite.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::attendance::clock::Clock;
use crate::attendance::notify::{AttendanceEvent, NotificationSink};
use crate::attendance::roster::Roster;
use crate::attendance::store::{RecordStore, StoreError};
use crate::database::models::{AttendanceRecord, LeaveRecord};

type DayKey = (u64, u64, NaiveDate);

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<DayKey, AttendanceRecord>>,
    leaves: Mutex<Vec<LeaveRecord>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn insert(&self, record: AttendanceRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.user_id, record.guild_id, record.date), record);
    }

    pub fn add_leave(&self, leave: LeaveRecord) {
        self.leaves.lock().unwrap().push(leave);
    }

    pub fn get(&self, user_id: u64, guild_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.records.lock().unwrap().get(&(user_id, guild_id, date)).cloned()
    }

    fn read_check(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_attendance(
        &self,
        user_id: u64,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        // Suspend like a real round trip so concurrent callers interleave.
        tokio::task::yield_now().await;
        self.read_check()?;
        Ok(self.get(user_id, guild_id, date))
    }

    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.insert(record.clone());
        Ok(record.clone())
    }

    async fn list_attendance_for_day(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.read_check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.guild_id == guild_id && r.date == date)
            .cloned()
            .collect())
    }

    async fn list_open_records(&self, guild_id: u64) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.read_check()?;
        let mut open: Vec<AttendanceRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.guild_id == guild_id && r.has_open_session())
            .cloned()
            .collect();
        open.sort_by_key(|r| (r.date, r.user_id));
        Ok(open)
    }

    async fn find_approved_leave(
        &self,
        subject_id: u64,
        guild_id: u64,
        day: NaiveDate,
    ) -> Result<Option<LeaveRecord>, StoreError> {
        self.read_check()?;
        Ok(self
            .leaves
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.subject_id == subject_id && l.guild_id == guild_id && l.exempts(day))
            .cloned())
    }
}

/// Clock pinned to a settable instant, reporting in UTC+03:00.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            offset: FixedOffset::east_opt(3 * 3600).unwrap(),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AttendanceEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, event: &AttendanceEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn emit(&self, _event: &AttendanceEvent) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("log channel unreachable"))
    }
}

#[derive(Default)]
pub struct StaticRoster {
    pub guilds: HashMap<u64, BTreeSet<u64>>,
}

#[async_trait]
impl Roster for StaticRoster {
    async fn eligible_subjects(&self, guild_id: u64) -> anyhow::Result<Option<BTreeSet<u64>>> {
        Ok(self.guilds.get(&guild_id).cloned())
    }
}
