use crate::utils::time::parse_date_string;
use anyhow::Result;
use chrono::NaiveDate;

/// Longest leave a single request may cover.
pub const MAX_LEAVE_DAYS: i64 = 90;
pub const MAX_REASON_LENGTH: usize = 500;

pub struct LeaveRequestInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

pub fn validate_leave_request(start: &str, end: &str, reason: &str, today: NaiveDate) -> Result<LeaveRequestInput> {
    let start_date = parse_date_string(start)?;
    let end_date = parse_date_string(end)?;

    validate_date_order(start_date, end_date)?;
    validate_date_not_past(start_date, today)?;
    validate_leave_length(start_date, end_date)?;
    let reason = validate_reason(reason)?;

    Ok(LeaveRequestInput {
        start_date,
        end_date,
        reason,
    })
}

pub fn validate_date_order(start_date: NaiveDate, end_date: NaiveDate) -> Result<()> {
    if end_date < start_date {
        return Err(anyhow::anyhow!("The end date must not be before the start date"));
    }
    Ok(())
}

pub fn validate_date_not_past(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date < today {
        return Err(anyhow::anyhow!("The start date cannot be in the past"));
    }
    Ok(())
}

pub fn validate_leave_length(start_date: NaiveDate, end_date: NaiveDate) -> Result<()> {
    let days = end_date.signed_duration_since(start_date).num_days() + 1;
    if days > MAX_LEAVE_DAYS {
        return Err(anyhow::anyhow!(
            "A leave can cover at most {} days (requested {})",
            MAX_LEAVE_DAYS,
            days
        ));
    }
    Ok(())
}

pub fn validate_reason(reason: &str) -> Result<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(anyhow::anyhow!("Please give a reason for the leave"));
    }
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(anyhow::anyhow!("The reason is limited to {} characters", MAX_REASON_LENGTH));
    }
    Ok(reason.to_string())
}
