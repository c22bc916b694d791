pub mod commands;
pub mod handlers;
pub mod interactions;
pub mod notify;
pub mod presence;
pub mod roster;

use crate::attendance::{AttendanceTracker, ConcurrencyGuard, PresenceRoleSink, RetryingStore, Roster, SystemClock};
use crate::config::Config;
use crate::database::{self, SqliteRecordStore};
use crate::scheduler;
use anyhow::Result;
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[derive(Clone)]
pub struct Data {
    pub pool: SqlitePool,
    pub config: Config,
    pub tracker: Arc<AttendanceTracker>,
    pub roster: Arc<dyn Roster>,
}

pub async fn create_bot(config: Config) -> Result<serenity::Client> {
    let pool = database::create_connection(&config.database_url).await?;

    // Member listing for the absence roster needs the privileged members intent.
    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;

    let setup_config = config.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::attendance::checkin(),
                commands::attendance::checkout(),
                commands::attendance::force_checkout(),
                commands::attendance::open_sessions(),
                commands::attendance::attendance_panel(),
                commands::status::status(),
                commands::reports::daily_report(),
                commands::reports::absence_report(),
                commands::leave::leave(),
                commands::settings::attendance_settings(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let config = setup_config;
                let store = RetryingStore::new(SqliteRecordStore::new(pool.clone()), config.store_retry);
                let notifier = notify::ChannelNotifier::new(
                    ctx.http.clone(),
                    pool.clone(),
                    config.log_channel_name.clone(),
                    config.utc_offset,
                );
                let presence = presence::DiscordPresenceRoles::new(ctx.http.clone(), pool.clone());
                let notifier = PresenceRoleSink::new(Arc::new(presence), Arc::new(notifier));
                let tracker = Arc::new(AttendanceTracker::new(
                    Arc::new(store),
                    Arc::new(SystemClock::new(config.utc_offset)),
                    Arc::new(notifier),
                    ConcurrencyGuard::new(),
                ));
                let roster: Arc<dyn Roster> = Arc::new(roster::RoleRoster::new(ctx.http.clone(), pool.clone()));

                scheduler::spawn(
                    ctx.cache.clone(),
                    tracker.clone(),
                    roster.clone(),
                    pool.clone(),
                    &config,
                );

                Ok(Data {
                    pool,
                    config,
                    tracker,
                    roster,
                })
            })
        })
        .build();

    let client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    Ok(client)
}
