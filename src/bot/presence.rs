use crate::attendance::PresenceRoles;
use crate::database::queries;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Gives the configured checked-in role on check-in and takes it away on check-out.
pub struct DiscordPresenceRoles {
    http: Arc<serenity::Http>,
    pool: SqlitePool,
}

impl DiscordPresenceRoles {
    pub fn new(http: Arc<serenity::Http>, pool: SqlitePool) -> Self {
        Self { http, pool }
    }
}

#[async_trait]
impl PresenceRoles for DiscordPresenceRoles {
    async fn set_present(&self, guild_id: u64, user_id: u64, present: bool) -> anyhow::Result<()> {
        let settings = queries::get_guild_settings(&self.pool, guild_id).await?;
        let Some(role_id) = settings.presence_role_id else {
            return Ok(());
        };

        let (guild, user, role) = (
            serenity::GuildId::new(guild_id),
            serenity::UserId::new(user_id),
            serenity::RoleId::new(role_id),
        );
        if present {
            self.http.add_member_role(guild, user, role, Some("Checked in")).await?;
        } else {
            self.http.remove_member_role(guild, user, role, Some("Checked out")).await?;
        }
        tracing::debug!(guild_id, user_id, role_id, present, "Presence role updated");
        Ok(())
    }
}
