use crate::bot::handlers::{self, BotDialogue, Command};
use crate::bot::membership::TelegramMembershipLookup;
use crate::bot::state::State;
use crate::bot::{ConversationFlow, FlowOptions, MembershipGate};
use crate::catalog::OmdbClient;
use crate::config::Settings;
use crate::links::{run_sweeper, LinkIssuer, LinkStore, SystemClock};
use crate::scrape::SiteScraper;
use crate::web;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Which long-running task stopped first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stopped {
    Bot,
    Http,
}

/// Handles of the tasks started by [`run_bot`]
struct Tasks {
    bot: JoinHandle<()>,
    http: JoinHandle<std::io::Result<()>>,
    sweeper: JoinHandle<()>,
}

/// What [`supervise`] observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Supervised {
    first: Stopped,
    sweeper_failed: bool,
}

/// Run the bot, the redirect endpoint and the link sweeper until one of them stops.
///
/// # Errors
///
/// Returns an error if startup fails (bad scraper URL, port already in use).
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let store = Arc::new(LinkStore::new(
        Arc::new(SystemClock),
        settings.link_max_entries,
    ));
    let issuer = Arc::new(LinkIssuer::new(store.clone(), settings.public_base_url()));
    info!(
        "Link store initialized (ttl: {}s, max_entries: {}, base: {})",
        settings.link_ttl_secs,
        store.capacity(),
        settings.public_base_url()
    );

    let bot = Bot::new(settings.bot_token.clone());
    let flow = init_flow(&settings, bot.clone(), issuer)?;

    let listener = TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", settings.port))?;

    let cancel = CancellationToken::new();

    let sweeper = tokio::spawn(run_sweeper(
        store.clone(),
        Duration::from_secs(settings.link_sweep_interval_secs.max(1)),
        cancel.clone(),
    ));

    let http = tokio::spawn(web::serve(
        listener,
        web::build_router(store),
        cancel.clone(),
    ));

    let mut dispatcher = Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![flow, init_bot_state()])
        .enable_ctrlc_handler()
        .build();
    let bot_shutdown = dispatcher.shutdown_token();
    let bot_task = tokio::spawn(async move { dispatcher.dispatch().await });

    info!("Bot is running...");

    let tasks = Tasks {
        bot: bot_task,
        http,
        sweeper,
    };
    supervise(tasks, cancel, || async move {
        match bot_shutdown.shutdown() {
            Ok(wait) => wait.await,
            Err(e) => warn!("Bot dispatcher was not running: {e}"),
        }
    })
    .await;

    info!("Shutdown complete.");
    Ok(())
}

/// Wait for the bot or the HTTP server to stop, then stop everything else.
///
/// A sweeper that dies early is reported at once; the bot and the HTTP server
/// keep running without it.
async fn supervise<F, Fut>(tasks: Tasks, cancel: CancellationToken, stop_bot: F) -> Supervised
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let Tasks {
        bot: mut bot_task,
        mut http,
        mut sweeper,
    } = tasks;
    let mut sweeper_done = false;
    let mut sweeper_failed = false;

    let first = loop {
        tokio::select! {
            res = &mut bot_task => {
                match res {
                    Ok(()) => info!("Bot dispatcher stopped, shutting down HTTP server"),
                    Err(e) => error!("Bot dispatcher task failed: {e}"),
                }
                break Stopped::Bot;
            }
            res = &mut http => {
                log_http_exit(res);
                break Stopped::Http;
            }
            res = &mut sweeper, if !sweeper_done => {
                sweeper_done = true;
                sweeper_failed = log_sweeper_exit(res);
            }
        }
    };

    match first {
        Stopped::Bot => {
            cancel.cancel();
            log_http_exit(http.await);
        }
        Stopped::Http => {
            stop_bot().await;
            if let Err(e) = bot_task.await {
                error!("Bot dispatcher task failed: {e}");
            }
        }
    }

    cancel.cancel();
    if !sweeper_done {
        sweeper_failed = log_sweeper_exit(sweeper.await);
    }

    Supervised {
        first,
        sweeper_failed,
    }
}

fn log_http_exit(res: Result<std::io::Result<()>, JoinError>) {
    match res {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => error!("HTTP server failed: {e}"),
        Err(e) => error!("HTTP server task failed: {e}"),
    }
}

/// Returns true if the sweeper task panicked or was aborted
fn log_sweeper_exit(res: Result<(), JoinError>) -> bool {
    match res {
        Ok(()) => {
            info!("Link sweeper stopped");
            false
        }
        Err(e) => {
            error!("Link sweeper task failed: {e}");
            true
        }
    }
}

fn init_flow(settings: &Settings, bot: Bot, issuer: Arc<LinkIssuer>) -> Result<Arc<ConversationFlow>> {
    let timeout = Duration::from_secs(settings.http_timeout_secs);

    let catalog = Arc::new(OmdbClient::new(
        &settings.omdb_base_url,
        &settings.omdb_api_key,
        timeout,
    ));
    info!("Catalog client initialized ({}).", settings.omdb_base_url);

    let scraper = Arc::new(
        SiteScraper::new(
            &settings.scraper_base_url,
            &settings.scraper_link_marker,
            settings.scraper_title_match,
            timeout,
        )
        .context("Invalid scraper base URL")?,
    );
    info!(
        "Scraper initialized ({}, title match: {:?}).",
        settings.scraper_base_url, settings.scraper_title_match
    );

    let channels = settings.channel_ids();
    if channels.is_empty() {
        warn!("No CHANNEL_IDS configured, membership gate admits everyone.");
    } else {
        info!("Membership gate requires channels: {:?}", channels);
    }
    let gate = MembershipGate::new(Arc::new(TelegramMembershipLookup::new(bot)), channels);

    Ok(Arc::new(ConversationFlow::new(
        gate,
        catalog,
        scraper,
        issuer,
        FlowOptions {
            link_ttl_secs: settings.link_ttl_secs,
            result_limit: settings.search_result_limit,
        },
    )))
}

fn init_bot_state() -> Arc<InMemStorage<State>> {
    InMemStorage::<State>::new()
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                .endpoint(handle_selection),
        )
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                )
                .branch(dptree::endpoint(handle_non_text)),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => handlers::start(bot, msg, dialogue).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    flow: Arc<ConversationFlow>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, flow, dialogue).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_non_text(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_non_text(bot, msg).await {
        error!("Non-text handler error: {}", e);
    }
    respond(())
}

async fn handle_selection(
    bot: Bot,
    q: CallbackQuery,
    flow: Arc<ConversationFlow>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_selection(bot, q, flow, dialogue).await {
        error!("Selection handler error: {}", e);
    }
    respond(())
}
