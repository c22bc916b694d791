use crate::attendance::{AbsenceReport, AttendanceEvent, DailyReport};
use crate::database::models::{AttendanceRecord, LeaveRecord, LeaveStatus};
use crate::utils::time::{format_date, format_datetime_local, format_duration_minutes, format_time_local};
use chrono::FixedOffset;
use poise::serenity_prelude as serenity;

/// Discord rejects embed field values longer than this.
pub const EMBED_FIELD_LIMIT: usize = 1024;
/// Characters an embed may spend on its member lists. Discord caps the whole
/// embed at 6000; the rest covers titles, summary fields and field names.
const LIST_BUDGET: usize = 4000;
/// Kept free for the "… and N more" line.
const OVERFLOW_RESERVE: usize = 32;

const GREEN: u32 = 0x2ecc71;
const RED: u32 = 0xe74c3c;
const BLUE: u32 = 0x3498db;
const PURPLE: u32 = 0x9b59b6;
const ORANGE: u32 = 0xe67e22;

pub fn format_error_message(error: &str) -> String {
    format!("❌ **Error**: {}", error)
}

pub fn format_success_message(message: &str) -> String {
    format!("✅ {}", message)
}

pub fn format_info_message(message: &str) -> String {
    format!("ℹ️ {}", message)
}

pub fn mention(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

/// Groups lines into chunks of at most `max_len` characters, never splitting a line.
/// A single line over the limit is truncated.
pub fn split_into_chunks(lines: &[String], max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let line = truncate(line, max_len);
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn truncate(line: &str, max_len: usize) -> String {
    if line.chars().count() <= max_len {
        return line.to_string();
    }
    let mut kept: String = line.chars().take(max_len.saturating_sub(1)).collect();
    kept.push('…');
    kept
}

/// Keeps the leading lines that fit in `budget` characters, counting one
/// separator per line, and replaces the rest with "… and N more".
pub fn fit_lines(lines: &[String], budget: usize) -> Vec<String> {
    let line_cost = |line: &String| line.chars().count().min(EMBED_FIELD_LIMIT) + 1;
    if lines.iter().map(line_cost).sum::<usize>() <= budget {
        return lines.to_vec();
    }

    let room = budget.saturating_sub(OVERFLOW_RESERVE);
    let mut used = 0;
    let mut kept = Vec::new();
    for line in lines {
        let cost = line_cost(line);
        if used + cost > room {
            break;
        }
        used += cost;
        kept.push(line.clone());
    }
    kept.push(format!("… and {} more", lines.len() - kept.len()));
    kept
}

/// Adds `lines` as one or more fields titled `name`, `name (cont.)`, ...
/// spending at most `budget` characters on the values.
fn add_chunked_fields(
    mut embed: serenity::CreateEmbed,
    name: &str,
    lines: &[String],
    budget: usize,
) -> serenity::CreateEmbed {
    let lines = fit_lines(lines, budget);
    for (i, chunk) in split_into_chunks(&lines, EMBED_FIELD_LIMIT).into_iter().enumerate() {
        let title = if i == 0 { name.to_string() } else { format!("{} (cont.)", name) };
        embed = embed.field(title, chunk, false);
    }
    embed
}

pub fn format_record_sessions(record: &AttendanceRecord, offset: FixedOffset) -> String {
    if record.sessions.is_empty() {
        return "No sessions recorded today".to_string();
    }

    let mut lines = Vec::with_capacity(record.sessions.len() + 1);
    let mut total = 0;
    for (i, session) in record.sessions.iter().enumerate() {
        match (session.check_out, session.closed_minutes()) {
            (Some(check_out), Some(minutes)) => {
                total += minutes;
                lines.push(format!(
                    "#{} 🟢 {} → 🔴 {} ({})",
                    i + 1,
                    format_time_local(session.check_in, offset),
                    format_time_local(check_out, offset),
                    format_duration_minutes(minutes)
                ));
            }
            _ => lines.push(format!(
                "#{} 🟢 {} → ⏳ **in progress**",
                i + 1,
                format_time_local(session.check_in, offset)
            )),
        }
    }
    lines.push(format!("\n📊 **Total**: {}", format_duration_minutes(total)));
    lines.join("\n")
}

pub fn create_error_embed(title: &str, description: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(RED)
        .timestamp(serenity::Timestamp::now())
}

pub fn create_info_embed(title: &str, description: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(BLUE)
        .timestamp(serenity::Timestamp::now())
}

pub fn create_status_embed(username: &str, record: Option<&AttendanceRecord>, offset: FixedOffset) -> serenity::CreateEmbed {
    let (description, date) = match record {
        Some(record) => (format_record_sessions(record, offset), Some(record.date)),
        None => ("No sessions recorded today".to_string(), None),
    };
    let mut embed = serenity::CreateEmbed::new()
        .title("📊 Attendance status")
        .description(description)
        .color(BLUE)
        .author(serenity::CreateEmbedAuthor::new(username))
        .timestamp(serenity::Timestamp::now());
    if let Some(date) = date {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format_date(date)));
    }
    embed
}

pub fn create_daily_report_embed(report: &DailyReport, offset: FixedOffset) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("📅 Daily report: {}", format_date(report.date)))
        .color(PURPLE)
        .timestamp(serenity::Timestamp::now());

    if report.is_empty() {
        return embed.description("Nobody checked in on this day.");
    }

    let first = report
        .earliest_check_in
        .map(|t| format_time_local(t, offset))
        .unwrap_or_else(|| "-".to_string());
    let last = report
        .latest_check_out
        .map(|t| format_time_local(t, offset))
        .unwrap_or_else(|| "-".to_string());

    embed = embed
        .field("Attendees", report.subject_count().to_string(), true)
        .field("Sessions", report.total_sessions.to_string(), true)
        .field("Total time", format_duration_minutes(report.total_minutes), true)
        .field("First check-in", first, true)
        .field("Last check-out", last, true);

    let lines: Vec<String> = report
        .subjects
        .iter()
        .map(|s| {
            format!(
                "{} {} ({} session{})",
                mention(s.user_id),
                format_duration_minutes(s.total_minutes),
                s.session_count,
                if s.session_count == 1 { "" } else { "s" }
            )
        })
        .collect();
    add_chunked_fields(embed, "Breakdown", &lines, LIST_BUDGET)
}

pub fn create_absence_report_embed(report: &AbsenceReport) -> serenity::CreateEmbed {
    // Everyone on leave reads as full attendance.
    let rate = report.attendance_rate().unwrap_or(100);
    let color = if report.absent.is_empty() { GREEN } else { ORANGE };

    let embed = serenity::CreateEmbed::new()
        .title(format!("🚨 Absence report: {}", format_date(report.date)))
        .color(color)
        .field("Eligible", report.total_eligible.to_string(), true)
        .field("Present", report.present_count.to_string(), true)
        .field("On leave", report.on_leave_count.to_string(), true)
        .field("Absent", report.absent.len().to_string(), true)
        .field("Attendance rate", format!("{}%", rate), true)
        .timestamp(serenity::Timestamp::now());

    if report.absent.is_empty() {
        return embed.description("Everyone is accounted for.");
    }

    let lines: Vec<String> = report
        .absent
        .iter()
        .map(|a| {
            format!(
                "{} absent {} day{} in a row",
                mention(a.user_id),
                a.consecutive_absent_days,
                if a.consecutive_absent_days == 1 { "" } else { "s" }
            )
        })
        .collect();
    add_chunked_fields(embed, "Absent members", &lines, LIST_BUDGET)
}

pub fn create_open_sessions_embed(records: &[AttendanceRecord], offset: FixedOffset) -> serenity::CreateEmbed {
    let embed = serenity::CreateEmbed::new()
        .title("⏳ Open sessions")
        .color(BLUE)
        .timestamp(serenity::Timestamp::now());

    let lines: Vec<String> = records
        .iter()
        .filter_map(|record| {
            record.open_session().map(|session| {
                format!(
                    "{} since {}",
                    mention(record.user_id),
                    format_datetime_local(session.check_in, offset)
                )
            })
        })
        .collect();

    if lines.is_empty() {
        return embed.description("Nobody is checked in.");
    }
    add_chunked_fields(embed, format!("{} checked in", lines.len()).as_str(), &lines, LIST_BUDGET)
}

pub fn create_leave_list_embed(leaves: &[LeaveRecord]) -> serenity::CreateEmbed {
    let embed = serenity::CreateEmbed::new()
        .title("🏖️ Leaves")
        .color(BLUE)
        .timestamp(serenity::Timestamp::now());

    let describe = |leave: &LeaveRecord| {
        format!(
            "#{} {} {} → {}: {}",
            leave.id,
            mention(leave.subject_id),
            format_date(leave.start_date),
            format_date(leave.end_date),
            leave.reason
        )
    };
    let approved: Vec<String> = leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Approved)
        .map(describe)
        .collect();
    let pending: Vec<String> = leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Pending)
        .map(describe)
        .collect();

    if approved.is_empty() && pending.is_empty() {
        return embed.description("No active or pending leaves.");
    }

    let embed = add_chunked_fields(embed, "On leave today", &approved, LIST_BUDGET / 2);
    add_chunked_fields(embed, "Pending review", &pending, LIST_BUDGET / 2)
}

/// Embed posted to a guild's log channel for an attendance event.
pub fn create_event_embed(event: &AttendanceEvent, offset: FixedOffset) -> serenity::CreateEmbed {
    match event {
        AttendanceEvent::CheckIn {
            user_id,
            at,
            session_index,
            ..
        } => serenity::CreateEmbed::new()
            .title("🟢 Check-in")
            .description(format!(
                "{} checked in at {} (session #{})",
                mention(*user_id),
                format_time_local(*at, offset),
                session_index + 1
            ))
            .color(GREEN)
            .timestamp(serenity::Timestamp::now()),
        AttendanceEvent::CheckOut {
            user_id,
            at,
            check_in,
            duration_minutes,
            forced_by,
            ..
        } => {
            let mut embed = serenity::CreateEmbed::new()
                .title("🔴 Check-out")
                .description(format!(
                    "{} checked out at {}",
                    mention(*user_id),
                    format_time_local(*at, offset)
                ))
                .field("Checked in", format_time_local(*check_in, offset), true)
                .field("Duration", format_duration_minutes(*duration_minutes), true)
                .color(RED)
                .timestamp(serenity::Timestamp::now());
            if let Some(moderator) = forced_by {
                embed = embed.field("Closed by", mention(*moderator), true);
            }
            embed
        }
        AttendanceEvent::DailyReport(report) => create_daily_report_embed(report, offset),
        AttendanceEvent::AbsenceReport(report) => create_absence_report_embed(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Session;
    use crate::attendance::report::{AbsentSubject, SubjectSummary};
    use chrono::{NaiveDate, TimeZone, Utc};

    const EMBED_TOTAL_LIMIT: usize = 6000;
    const EMBED_FIELD_COUNT_LIMIT: usize = 25;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chunks_respect_limit_without_splitting_lines() {
        let chunks = split_into_chunks(&lines(&["aaaa", "bbbb", "cccc"]), 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn oversized_line_is_truncated() {
        let chunks = split_into_chunks(&lines(&["abcdefghij"]), 6);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chars().count() <= 6);
        assert!(chunks[0].ends_with('…'));
    }

    #[test]
    fn no_lines_no_chunks() {
        assert!(split_into_chunks(&[], 1024).is_empty());
    }

    #[test]
    fn record_sessions_show_open_and_total() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let mut record = AttendanceRecord::new(1, 2, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let mut first = Session::open(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap());
        first.close(Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).unwrap());
        record.sessions.push(first);
        record.push_session(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());

        let text = format_record_sessions(&record, offset);

        assert!(text.contains("#1 🟢 09:00 → 🔴 10:30 (1h 30m)"));
        assert!(text.contains("#2 🟢 12:00 → ⏳ **in progress**"));
        assert!(text.contains("**Total**: 1h 30m"));
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    /// Characters Discord counts towards the embed total, and the field count.
    fn embed_size(embed: &serenity::CreateEmbed) -> (usize, usize) {
        let value = serde_json::to_value(embed).unwrap();
        let text = |v: &serde_json::Value| v.as_str().map_or(0, |s| s.chars().count());
        let fields = value["fields"].as_array().cloned().unwrap_or_default();
        for field in &fields {
            assert!(text(&field["value"]) <= EMBED_FIELD_LIMIT);
        }
        let total = text(&value["title"])
            + text(&value["description"])
            + text(&value["footer"]["text"])
            + text(&value["author"]["name"])
            + fields.iter().map(|f| text(&f["name"]) + text(&f["value"])).sum::<usize>();
        (total, fields.len())
    }

    fn field_values(embed: &serenity::CreateEmbed) -> String {
        let value = serde_json::to_value(embed).unwrap();
        value["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f["value"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    fn assert_within_limits(embed: &serenity::CreateEmbed) {
        let (total, fields) = embed_size(embed);
        assert!(total <= EMBED_TOTAL_LIMIT, "embed text is {} characters", total);
        assert!(fields <= EMBED_FIELD_COUNT_LIMIT, "embed has {} fields", fields);
    }

    #[test]
    fn fit_lines_keeps_everything_under_budget() {
        let input = lines(&["aaaa", "bbbb"]);
        assert_eq!(fit_lines(&input, 10), input);
    }

    #[test]
    fn fit_lines_reports_what_it_dropped() {
        let input: Vec<String> = (0..100).map(|i| format!("member {:03}", i)).collect();
        let kept = fit_lines(&input, 132);

        // 100 characters of room after the reserve, 11 per line
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[8], "member 008");
        assert_eq!(kept[9], "… and 91 more");
    }

    #[test]
    fn large_daily_report_fits_one_embed() {
        let subjects: Vec<SubjectSummary> = (0..200u64)
            .map(|i| SubjectSummary {
                user_id: 1_200_000_000_000_000_000 + i,
                total_minutes: 125,
                session_count: 1,
                earliest_check_in: Some(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()),
                latest_check_out: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap()),
            })
            .collect();
        let report = DailyReport {
            guild_id: 2,
            date: day(),
            total_minutes: 125 * 200,
            total_sessions: 200,
            earliest_check_in: subjects[0].earliest_check_in,
            latest_check_out: subjects[0].latest_check_out,
            subjects,
        };

        let embed = create_daily_report_embed(&report, offset());

        assert_within_limits(&embed);
        let values = field_values(&embed);
        assert!(values.contains("<@1200000000000000000> 2h 05m (1 session)"));
        assert!(values.contains(" more"));
    }

    #[test]
    fn large_absence_report_fits_one_embed() {
        let absent: Vec<AbsentSubject> = (0..500u64)
            .map(|i| AbsentSubject {
                user_id: 1_200_000_000_000_000_000 + i,
                consecutive_absent_days: 30,
            })
            .collect();
        let report = AbsenceReport::new(2, day(), 500, 0, 0, absent);

        let embed = create_absence_report_embed(&report);

        assert_within_limits(&embed);
        assert!(field_values(&embed).contains(" more"));
    }

    #[test]
    fn many_open_sessions_fit_one_embed() {
        let records: Vec<AttendanceRecord> = (0..300u64)
            .map(|i| {
                let mut record = AttendanceRecord::new(1_200_000_000_000_000_000 + i, 2, day());
                record.push_session(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap());
                record
            })
            .collect();

        assert_within_limits(&create_open_sessions_embed(&records, offset()));
    }

    #[test]
    fn long_leave_reasons_fit_one_embed() {
        let leaves: Vec<LeaveRecord> = (0..120i64)
            .map(|i| LeaveRecord {
                id: i,
                subject_id: 1_200_000_000_000_000_000 + i as u64,
                guild_id: 2,
                start_date: day(),
                end_date: day(),
                reason: "family matters ".repeat(33),
                status: if i % 2 == 0 { LeaveStatus::Approved } else { LeaveStatus::Pending },
                created_at: Utc.with_ymd_and_hms(2024, 4, 20, 9, 0, 0).unwrap(),
            })
            .collect();

        let embed = create_leave_list_embed(&leaves);

        assert_within_limits(&embed);
        let values = field_values(&embed);
        assert!(values.contains("#0 <@1200000000000000000>"));
        assert!(values.contains("#1 <@1200000000000000001>"));
    }
}
