use crate::attendance::Roster;
use crate::database::queries;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;

const MEMBER_PAGE_SIZE: u64 = 1000;

/// Eligible subjects are the non-bot members holding the guild's tracked role.
pub struct RoleRoster {
    http: Arc<serenity::Http>,
    pool: SqlitePool,
}

impl RoleRoster {
    pub fn new(http: Arc<serenity::Http>, pool: SqlitePool) -> Self {
        Self { http, pool }
    }
}

#[async_trait]
impl Roster for RoleRoster {
    async fn eligible_subjects(&self, guild_id: u64) -> anyhow::Result<Option<BTreeSet<u64>>> {
        let settings = queries::get_guild_settings(&self.pool, guild_id).await?;
        let Some(role_id) = settings.tracked_role_id else {
            return Ok(None);
        };
        let role = serenity::RoleId::new(role_id);
        let guild = serenity::GuildId::new(guild_id);

        let mut eligible = BTreeSet::new();
        let mut after: Option<serenity::UserId> = None;
        loop {
            let page = guild.members(&self.http, Some(MEMBER_PAGE_SIZE), after).await?;
            eligible.extend(
                page.iter()
                    .filter(|m| !m.user.bot && m.roles.contains(&role))
                    .map(|m| m.user.id.get()),
            );
            if (page.len() as u64) < MEMBER_PAGE_SIZE {
                break;
            }
            after = page.last().map(|m| m.user.id);
        }

        tracing::debug!(guild_id, role_id, count = eligible.len(), "Resolved roster");
        Ok(Some(eligible))
    }
}
