//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Dispatch configuration validation and logging at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| anyhow::anyhow!("Failed to create log directory: {}", e))?;
        }
    }
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the dispatch configuration at application startup
///
/// Warns loudly when the driver directory is empty: every broadcast would
/// then end on the "no drivers available" path.
pub fn log_dispatch_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🚖 Dispatch Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("💾 DATABASE_PATH: {}", config::DATABASE_PATH.as_str());
    log::info!(
        "⏰ Order timeout: {}s, send delay: {}ms, kept messages per driver: {}",
        *config::dispatch::ORDER_TIMEOUT_SECS,
        *config::dispatch::SEND_DELAY_MS,
        *config::dispatch::MESSAGE_RETENTION
    );

    if config::CLIENT_BOT_TOKEN.is_empty() {
        log::warn!("⚠️  CLIENT_BOT_TOKEN: not set");
    }
    if config::DRIVER_BOT_TOKEN.is_empty() {
        log::warn!("⚠️  DRIVER_BOT_TOKEN: not set");
    }

    if config::DRIVER_IDS.is_empty() {
        log::error!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        log::error!("❌ DRIVER_IDS is empty - every order will end with 'no drivers available'!");
        log::error!("   Set: export DRIVER_IDS=628521909,6158974369");
        log::error!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    } else {
        log::info!("✅ DRIVER_IDS: {} driver(s) {:?}", config::DRIVER_IDS.len(), *config::DRIVER_IDS);
        log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}
