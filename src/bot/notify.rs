use crate::attendance::{AttendanceEvent, NotificationSink};
use crate::database::queries;
use crate::utils::format::create_event_embed;
use async_trait::async_trait;
use chrono::FixedOffset;
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Posts attendance events as embeds to each guild's log channel.
pub struct ChannelNotifier {
    http: Arc<serenity::Http>,
    pool: SqlitePool,
    fallback_channel_name: String,
    offset: FixedOffset,
}

impl ChannelNotifier {
    pub fn new(
        http: Arc<serenity::Http>,
        pool: SqlitePool,
        fallback_channel_name: String,
        offset: FixedOffset,
    ) -> Self {
        Self {
            http,
            pool,
            fallback_channel_name,
            offset,
        }
    }

    /// Configured log channel, else the first text channel carrying the fallback name.
    async fn log_channel(&self, guild_id: u64) -> anyhow::Result<Option<serenity::ChannelId>> {
        let settings = queries::get_guild_settings(&self.pool, guild_id).await?;
        if let Some(channel_id) = settings.log_channel_id {
            return Ok(Some(serenity::ChannelId::new(channel_id)));
        }

        let channels = serenity::GuildId::new(guild_id).channels(&self.http).await?;
        Ok(channels
            .values()
            .find(|c| c.kind == serenity::ChannelType::Text && c.name == self.fallback_channel_name)
            .map(|c| c.id))
    }
}

#[async_trait]
impl NotificationSink for ChannelNotifier {
    async fn emit(&self, event: &AttendanceEvent) -> anyhow::Result<()> {
        let guild_id = event.guild_id();
        let Some(channel_id) = self.log_channel(guild_id).await? else {
            tracing::debug!(guild_id, kind = event.kind(), "No log channel, event dropped");
            return Ok(());
        };

        let message = serenity::CreateMessage::new().embed(create_event_embed(event, self.offset));
        channel_id.send_message(&self.http, message).await?;
        Ok(())
    }
}
