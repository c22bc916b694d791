use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::attendance::store::{RecordStore, StoreError};
use crate::database::models::{AttendanceRecord, LeaveRecord, Session};
use crate::database::queries::{self, parse_id};

/// SQLite-backed [`RecordStore`]. One `attendance_days` row per day key, with its
/// sessions in `attendance_sessions` ordered by `position`.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads the records of `guild_id`, optionally restricted to one user and/or one day.
    async fn load_records(
        &self,
        guild_id: u64,
        user_id: Option<u64>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let user_filter = user_id.map(|id| id.to_string());

        let day_rows = sqlx::query(
            "SELECT user_id, date FROM attendance_days
             WHERE guild_id = ?1 AND (?2 IS NULL OR user_id = ?2) AND (?3 IS NULL OR date = ?3)",
        )
        .bind(guild_id.to_string())
        .bind(user_filter.clone())
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut records: BTreeMap<(NaiveDate, u64), AttendanceRecord> = BTreeMap::new();
        for row in &day_rows {
            let user = parse_id(&row.try_get::<String, _>("user_id")?, "user_id")?;
            let day: NaiveDate = row.try_get("date")?;
            records.insert((day, user), AttendanceRecord::new(user, guild_id, day));
        }

        let session_rows = sqlx::query(
            "SELECT user_id, date, check_in, check_out, duration_minutes FROM attendance_sessions
             WHERE guild_id = ?1 AND (?2 IS NULL OR user_id = ?2) AND (?3 IS NULL OR date = ?3)
             ORDER BY user_id ASC, date ASC, position ASC",
        )
        .bind(guild_id.to_string())
        .bind(user_filter.clone())
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        for row in &session_rows {
            let user = parse_id(&row.try_get::<String, _>("user_id")?, "user_id")?;
            let day: NaiveDate = row.try_get("date")?;
            let record = records.get_mut(&(day, user)).ok_or_else(|| {
                StoreError::Malformed(format!("session without day row: {}/{}/{}", user, guild_id, day))
            })?;
            record.sessions.push(Session {
                check_in: row.try_get("check_in")?,
                check_out: row.try_get("check_out")?,
                duration_minutes: row.try_get("duration_minutes")?,
            });
        }

        records
            .into_values()
            .map(|record| record.normalize().map_err(StoreError::Malformed))
            .collect()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_attendance(
        &self,
        user_id: u64,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let mut records = self.load_records(guild_id, Some(user_id), Some(date)).await?;
        Ok(records.pop())
    }

    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let record = record.clone().normalize().map_err(StoreError::Malformed)?;
        let user_id = record.user_id.to_string();
        let guild_id = record.guild_id.to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO attendance_days (user_id, guild_id, date) VALUES (?, ?, ?)
             ON CONFLICT(user_id, guild_id, date) DO UPDATE SET updated_at = CURRENT_TIMESTAMP",
        )
        .bind(user_id.as_str())
        .bind(guild_id.as_str())
        .bind(record.date)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM attendance_sessions WHERE user_id = ? AND guild_id = ? AND date = ?")
            .bind(user_id.as_str())
            .bind(guild_id.as_str())
            .bind(record.date)
            .execute(&mut *tx)
            .await?;

        for (position, session) in record.sessions.iter().enumerate() {
            sqlx::query(
                "INSERT INTO attendance_sessions
                     (user_id, guild_id, date, position, check_in, check_out, duration_minutes)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id.as_str())
            .bind(guild_id.as_str())
            .bind(record.date)
            .bind(position as i64)
            .bind(session.check_in)
            .bind(session.check_out)
            .bind(session.duration_minutes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(record)
    }

    async fn list_attendance_for_day(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut records = self.load_records(guild_id, None, Some(date)).await?;
        records.sort_by_key(|r| r.user_id);
        Ok(records)
    }

    async fn list_open_records(&self, guild_id: u64) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT user_id, date FROM attendance_sessions
             WHERE guild_id = ? AND check_out IS NULL
             ORDER BY date ASC",
        )
        .bind(guild_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut open = Vec::with_capacity(rows.len());
        for row in &rows {
            let user_id = parse_id(&row.try_get::<String, _>("user_id")?, "user_id")?;
            let date: NaiveDate = row.try_get("date")?;
            if let Some(record) = self.find_attendance(user_id, guild_id, date).await? {
                open.push(record);
            }
        }
        open.sort_by_key(|r| (r.date, r.user_id));
        Ok(open)
    }

    async fn find_approved_leave(
        &self,
        subject_id: u64,
        guild_id: u64,
        day: NaiveDate,
    ) -> Result<Option<LeaveRecord>, StoreError> {
        queries::find_approved_leave(&self.pool, subject_id, guild_id, day).await
    }
}
