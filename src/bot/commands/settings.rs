use crate::bot::commands::{guild_id, reply_ephemeral};
use crate::bot::{Context, Error};
use crate::database::models::GuildSettings;
use crate::database::queries;
use crate::utils::format::{create_info_embed, format_error_message};
use poise::serenity_prelude as serenity;

fn describe_settings(settings: &GuildSettings, fallback_channel: &str) -> String {
    let role = settings
        .tracked_role_id
        .map(|id| format!("<@&{}>", id))
        .unwrap_or_else(|| "not set (absence reports disabled)".to_string());
    let channel = settings
        .log_channel_id
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| format!("not set (falls back to #{})", fallback_channel));
    let presence = settings
        .presence_role_id
        .map(|id| format!("<@&{}>", id))
        .unwrap_or_else(|| "not set".to_string());
    format!(
        "**Tracked role**: {}\n**Log channel**: {}\n**Checked-in role**: {}",
        role, channel, presence
    )
}

/// Configure the tracked role, the log channel and the checked-in role
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn attendance_settings(
    ctx: Context<'_>,
    #[description = "Role whose members are expected to attend"] tracked_role: Option<serenity::Role>,
    #[description = "Channel receiving attendance logs and reports"] log_channel: Option<serenity::GuildChannel>,
    #[description = "Role given to members while they are checked in"] presence_role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let pool = &ctx.data().pool;

    let mut settings = match queries::get_guild_settings(pool, guild_id).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(guild_id, "Failed to load settings: {:?}", e);
            return reply_ephemeral(ctx, format_error_message("Could not load the settings")).await;
        }
    };

    let changed = tracked_role.is_some() || log_channel.is_some() || presence_role.is_some();
    if let Some(role) = tracked_role {
        settings.tracked_role_id = Some(role.id.get());
    }
    if let Some(channel) = log_channel {
        settings.log_channel_id = Some(channel.id.get());
    }
    if let Some(role) = presence_role {
        settings.presence_role_id = Some(role.id.get());
    }

    if changed {
        if let Err(e) = queries::upsert_guild_settings(pool, &settings).await {
            tracing::error!(guild_id, "Failed to save settings: {:?}", e);
            return reply_ephemeral(ctx, format_error_message("Could not save the settings")).await;
        }
        tracing::info!(
            guild_id,
            tracked_role_id = ?settings.tracked_role_id,
            log_channel_id = ?settings.log_channel_id,
            presence_role_id = ?settings.presence_role_id,
            "Settings updated"
        );
    }

    let title = if changed { "⚙️ Settings updated" } else { "⚙️ Attendance settings" };
    let embed = create_info_embed(title, &describe_settings(&settings, &ctx.data().config.log_channel_name));
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_configured_and_missing_values() {
        let settings = GuildSettings {
            guild_id: 1,
            tracked_role_id: Some(10),
            log_channel_id: None,
            presence_role_id: Some(11),
        };
        let text = describe_settings(&settings, "attendance-log");
        assert!(text.contains("<@&10>"));
        assert!(text.contains("**Checked-in role**: <@&11>"));
        assert!(text.contains("falls back to #attendance-log"));
    }
}
