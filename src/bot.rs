//! Telegram bot front end.
//!
//! Long-polls `getUpdates` and hands every update to its own tokio task, so
//! a slow upload for one user never blocks another. Two flows are served:
//!
//! - **Message**: the text is a fuzzy query. The bot replies with a
//!   `Found N` notice, then sends each ranked result by its remote handle,
//!   uploading first on a cache miss.
//! - **Inline query**: results are resolved to handles the same way and
//!   returned as cached MPEG4-GIF entries, in rank order.
//!
//! Only users listed in the auth file are served. Commands are not queries:
//! `/ping` answers `pong`, anything else answers `:(`.
//!
//! On shutdown, polling stops first; handler tasks already running are given
//! [`SHUTDOWN_GRACE`] to finish before the caller closes the store.

use anyhow::{anyhow, Result};
use gifbot_core::reconcile::AssetResolver;
use gifbot_core::search::{search_ex, SearchParams};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::auth::AuthList;
use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::telegram::{BotApi, InlineQuery, InlineResult, Message, TelegramGateway, Update};

pub const NOT_AUTHENTICATED: &str = "You're not authenticated";
pub const SEARCH_UNAVAILABLE: &str = "Search is unavailable right now, try again later";

/// How long in-flight handlers may run after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Everything an update handler needs, shared by all handler tasks.
pub struct BotContext {
    api: Arc<BotApi>,
    resolver: Arc<AssetResolver>,
    auth: AuthList,
    params: SearchParams,
}

impl BotContext {
    pub fn new(
        api: Arc<BotApi>,
        resolver: Arc<AssetResolver>,
        auth: AuthList,
        params: SearchParams,
    ) -> Self {
        Self {
            api,
            resolver,
            auth,
            params,
        }
    }
}

/// Start the bot and run until Ctrl-C.
pub async fn run_bot(config: &Config) -> Result<()> {
    let tg = config
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow!("`serve bot` requires a [telegram] section in the config"))?;

    let auth = AuthList::load(&tg.auth_list)?;
    if auth.is_empty() {
        warn!(path = %tg.auth_list.display(), "auth list is empty; every user will be refused");
    }

    let api = Arc::new(BotApi::from_config(tg)?);
    let store = Arc::new(SqliteStore::new(db::connect(config).await?));
    let gateway = Arc::new(TelegramGateway::new(Arc::clone(&api), tg.service_chat_id));
    let resolver = Arc::new(AssetResolver::new(
        store.clone(),
        gateway,
        config.assets.dir.clone(),
    ));
    let ctx = Arc::new(BotContext::new(api, resolver, auth, config.search_params()));

    info!(
        users = ctx.auth.len(),
        max_matches = ctx.params.max_matches,
        "bot started"
    );

    run_until(ctx, tg.poll_timeout_secs, SHUTDOWN_GRACE, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
    })
    .await;

    info!("bot shutting down");
    store.close().await;
    Ok(())
}

/// Poll and dispatch updates until `shutdown` completes, then wait up to
/// `grace` for the handlers already spawned.
pub async fn run_until<F>(
    ctx: Arc<BotContext>,
    poll_timeout_secs: u64,
    grace: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut tasks = JoinSet::new();
    tokio::select! {
        _ = poll_updates(ctx, poll_timeout_secs, &mut tasks) => {}
        _ = shutdown => {}
    }

    if tasks.is_empty() {
        return;
    }
    info!(in_flight = tasks.len(), "waiting for handlers");
    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(abandoned = tasks.len(), "handlers still running after grace period");
        tasks.abort_all();
    }
}

async fn poll_updates(ctx: Arc<BotContext>, poll_timeout_secs: u64, tasks: &mut JoinSet<()>) {
    let mut offset = 0i64;
    let mut failures = 0u32;

    loop {
        // Reap finished handlers.
        while tasks.try_join_next().is_some() {}

        let updates = match ctx.api.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => {
                failures = 0;
                updates
            }
            Err(e) => {
                // Backoff: 1s, 2s, 4s, ... capped at 32s.
                let delay = Duration::from_secs(1 << failures.min(5));
                failures += 1;
                warn!(error = %e, retry_in = ?delay, "getUpdates failed");
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                let update_id = update.update_id;
                if let Err(e) = handle_update(&ctx, update).await {
                    error!(update_id, error = %e, "update failed");
                }
            });
        }
    }
}

/// Handle one update. Unsupported update kinds are ignored.
pub async fn handle_update(ctx: &BotContext, update: Update) -> Result<()> {
    if let Some(message) = update.message {
        handle_message(ctx, message).await
    } else if let Some(query) = update.inline_query {
        handle_inline_query(ctx, query).await
    } else {
        debug!(update_id = update.update_id, "ignoring update");
        Ok(())
    }
}

async fn handle_message(ctx: &BotContext, message: Message) -> Result<()> {
    let chat_id = message.chat.id;

    let authorized = message
        .from
        .as_ref()
        .is_some_and(|user| ctx.auth.contains(user.id));
    if !authorized {
        return ctx.api.send_message(chat_id, NOT_AUTHENTICATED).await;
    }

    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };

    if let Some(command) = parse_command(text) {
        return ctx.api.send_message(chat_id, command_reply(command)).await;
    }

    let records = match search_ex(ctx.resolver.store().as_ref(), text, &ctx.params).await {
        Ok(records) => records,
        Err(e) => {
            error!(chat_id, query = text, error = %e, "search failed");
            return ctx.api.send_message(chat_id, SEARCH_UNAVAILABLE).await;
        }
    };
    info!(chat_id, query = text, found = records.len(), "message query");
    ctx.api
        .send_message(chat_id, &format!("Found {}", records.len()))
        .await?;

    for record in &records {
        let resolved = match ctx.resolver.resolve(record).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(record_id = record.id, error = %e, "skipping result");
                continue;
            }
        };
        if let Err(e) = ctx.api.send_animation(chat_id, &resolved.handle).await {
            warn!(record_id = record.id, error = %e, "failed to send animation");
        }
    }
    Ok(())
}

async fn handle_inline_query(ctx: &BotContext, query: InlineQuery) -> Result<()> {
    if !ctx.auth.contains(query.from.id) {
        let refusal = [InlineResult::article("0", NOT_AUTHENTICATED)];
        return ctx.api.answer_inline_query(&query.id, &refusal).await;
    }

    let records = match search_ex(ctx.resolver.store().as_ref(), &query.query, &ctx.params).await {
        Ok(records) => records,
        Err(e) => {
            error!(user_id = query.from.id, query = %query.query, error = %e, "search failed");
            let failure = [InlineResult::article("0", SEARCH_UNAVAILABLE)];
            return ctx.api.answer_inline_query(&query.id, &failure).await;
        }
    };
    info!(user_id = query.from.id, query = %query.query, found = records.len(), "inline query");

    let mut results = Vec::with_capacity(records.len());
    for (record, resolved) in records.iter().zip(ctx.resolver.resolve_all(&records).await) {
        match resolved {
            Ok(resolved) => {
                let id = results.len().to_string();
                results.push(InlineResult::Mpeg4Gif {
                    id,
                    mpeg4_file_id: resolved.handle,
                });
            }
            Err(e) => warn!(record_id = record.id, error = %e, "skipping result"),
        }
    }

    ctx.api.answer_inline_query(&query.id, &results).await
}

/// The command name of a `/command[@bot] args` message, if it is one.
fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn command_reply(command: &str) -> &'static str {
    match command {
        "ping" => "pong",
        _ => ":(",
    }
}
