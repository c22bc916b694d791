use crate::attendance::{AttendanceEvent, AttendanceTracker, Roster};
use crate::config::Config;
use crate::database::queries;
use crate::utils::time::{local_date, local_to_utc};
use anyhow::Result;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// First instant strictly after `now` whose local time in `offset` is `time`.
pub fn next_trigger(now: DateTime<Utc>, offset: FixedOffset, time: NaiveTime) -> DateTime<Utc> {
    let today = local_date(now, offset);
    let candidate = local_to_utc(today, time, offset);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    local_to_utc(tomorrow, time, offset)
}

/// Day a run at `trigger` reports on. Runs before local noon close out the
/// previous day; later runs report on their own day.
pub fn report_day(trigger: DateTime<Utc>, offset: FixedOffset, time: NaiveTime) -> NaiveDate {
    let day = local_date(trigger, offset);
    if time < NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN) {
        return day.checked_sub_days(Days::new(1)).unwrap_or(day);
    }
    day
}

/// End-of-day work for one guild: optional rollover, then the daily report and,
/// when the guild has a roster, the absence report.
pub async fn run_daily_cycle(
    tracker: &AttendanceTracker,
    roster: &dyn Roster,
    guild_id: u64,
    day: NaiveDate,
    at: DateTime<Utc>,
    auto_checkout: bool,
) -> Result<()> {
    if auto_checkout {
        tracker.close_open_sessions(guild_id, day, at).await?;
    }

    let daily = tracker.daily_report(guild_id, day).await?;
    tracker.notify(&AttendanceEvent::DailyReport(daily)).await;

    match roster.eligible_subjects(guild_id).await {
        Ok(Some(eligible)) => {
            let absence = tracker.absence_report(guild_id, day, &eligible).await?;
            tracing::info!(guild_id, %day, absent = absence.absent.len(), "Absence report built");
            tracker.notify(&AttendanceEvent::AbsenceReport(absence)).await;
        }
        Ok(None) => {
            tracing::debug!(guild_id, "No tracked role, absence report skipped");
        }
        Err(e) => {
            tracing::warn!(guild_id, "Failed to resolve roster, absence report skipped: {:?}", e);
        }
    }

    Ok(())
}

/// Runs the daily cycle for every cached guild at the configured local time.
pub fn spawn(
    cache: Arc<serenity::Cache>,
    tracker: Arc<AttendanceTracker>,
    roster: Arc<dyn Roster>,
    pool: SqlitePool,
    config: &Config,
) -> JoinHandle<()> {
    let time = config.daily_report_time;
    let auto_checkout = config.auto_checkout_at_rollover;

    tokio::spawn(async move {
        loop {
            let clock = tracker.clock();
            let now = clock.now();
            let next = next_trigger(now, clock.offset(), time);
            tracing::info!(next = %next, "Next daily run scheduled");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

            let day = report_day(next, clock.offset(), time);
            let at = clock.now();
            for guild_id in cache.guilds() {
                let guild_id = guild_id.get();
                if let Err(e) = run_daily_cycle(&tracker, roster.as_ref(), guild_id, day, at, auto_checkout).await {
                    tracing::error!(guild_id, %day, "Daily run failed: {:?}", e);
                }
            }

            match queries::complete_finished_leaves(&pool, clock.day_of(at)).await {
                Ok(0) => {}
                Ok(completed) => tracing::info!(completed, "Finished leaves completed"),
                Err(e) => tracing::error!("Failed to complete finished leaves: {:?}", e),
            }
        }
    })
}
