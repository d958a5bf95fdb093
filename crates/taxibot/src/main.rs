use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;

use dispatchcore::core::{config, init_logger, log_dispatch_configuration};
use dispatchcore::{
    BroadcastOutcome, DispatchEngine, DispatchSettings, DispatchStore, OrderPayload, SqliteStore, StaticDirectory,
};
use taxibot::cli::{Cli, Commands};
use taxibot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramChannel};

/// Extra wait on top of the order timeout before `broadcast` gives up.
const BROADCAST_WAIT_GRACE: Duration = Duration::from_secs(10);
const PENDING_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Main entry point
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env first: config statics read the environment on first access
    let _ = dotenv();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_driver_bot().await,
        Some(Commands::Broadcast { order_id, payload }) => run_broadcast(order_id, &payload).await,
        Some(Commands::Pending) => show_pending(),
    }
}

fn open_store() -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config::DATABASE_PATH)?;
    log::info!("📦 Shared order store: {}", config::DATABASE_PATH.as_str());
    Ok(Arc::new(store))
}

fn build_engine(store: Arc<SqliteStore>, directory: Arc<StaticDirectory>, driver_bot: Bot) -> Result<DispatchEngine> {
    let client_bot = create_bot(&config::CLIENT_BOT_TOKEN)?;
    let channel = Arc::new(TelegramChannel::new(client_bot, driver_bot));
    Ok(DispatchEngine::new(store, channel, directory, DispatchSettings::from_config()))
}

async fn run_driver_bot() -> Result<()> {
    log::info!("Starting driver bot...");
    log_dispatch_configuration();

    let store = open_store()?;
    let directory = Arc::new(StaticDirectory::from_config());
    let driver_bot = create_bot(&config::DRIVER_BOT_TOKEN)?;
    let engine = build_engine(store, directory.clone(), driver_bot.clone())?;

    if let Err(e) = setup_bot_commands(&driver_bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let handler = schema(HandlerDeps::new(engine.clone(), directory));

    Dispatcher::builder(driver_bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    engine.cancel_all_timeouts();
    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

async fn run_broadcast(order_id: i64, raw_payload: &str) -> Result<()> {
    log_dispatch_configuration();

    let payload = OrderPayload::from_value(serde_json::from_str(raw_payload)?)?;
    let store = open_store()?;
    let directory = Arc::new(StaticDirectory::from_config());
    let driver_bot = create_bot(&config::DRIVER_BOT_TOKEN)?;
    let engine = build_engine(store, directory, driver_bot)?;

    match engine.broadcast_order(order_id, payload).await? {
        BroadcastOutcome::NoDrivers => {
            println!("Order {} could not be sent to any driver", order_id);
            return Ok(());
        }
        BroadcastOutcome::Pending { notified } => {
            println!("Order {} sent to {} driver(s), waiting for an answer...", order_id, notified);
        }
    }

    let deadline = tokio::time::Instant::now() + engine.settings().order_timeout + BROADCAST_WAIT_GRACE;
    while engine.is_pending(order_id)? {
        if tokio::time::Instant::now() >= deadline {
            log::warn!("⚠️ Order {} still pending after its timeout, giving up", order_id);
            println!("Order {} is still pending", order_id);
            engine.cancel_all_timeouts();
            return Ok(());
        }
        tokio::time::sleep(PENDING_POLL_INTERVAL).await;
    }

    println!("Order {} resolved", order_id);

    // Let the silent driver notices delete themselves before exiting.
    let settings = engine.settings();
    tokio::time::sleep(settings.taken_notice_ttl.max(settings.timeout_notice_ttl) + Duration::from_secs(1)).await;
    Ok(())
}

fn show_pending() -> Result<()> {
    let store = open_store()?;
    let order_ids = store.list_order_ids()?;

    if order_ids.is_empty() {
        println!("No pending orders");
        return Ok(());
    }

    println!("{} pending order(s):", order_ids.len());
    for order_id in order_ids {
        let responses = store.get_responses(order_id)?;
        let answered: Vec<String> = responses
            .iter()
            .map(|(driver_id, response)| format!("{}={}", driver_id, response))
            .collect();
        if answered.is_empty() {
            println!("  #{}  no responses yet", order_id);
        } else {
            println!("  #{}  {}", order_id, answered.join(", "));
        }
    }
    Ok(())
}
