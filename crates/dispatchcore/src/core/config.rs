//! Configuration for both bot processes, read from the environment

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Shared dispatch database path
/// Read from DATABASE_PATH environment variable
/// Both the client-side and driver-side processes must point at the same file
/// Default: data/shared_orders.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "data/shared_orders.db".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: dispatch.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "dispatch.log".to_string()));

/// Token of the client-facing bot
pub static CLIENT_BOT_TOKEN: Lazy<String> = Lazy::new(|| env::var("CLIENT_BOT_TOKEN").unwrap_or_default());

/// Token of the driver-facing bot
pub static DRIVER_BOT_TOKEN: Lazy<String> = Lazy::new(|| env::var("DRIVER_BOT_TOKEN").unwrap_or_default());

/// Driver chat IDs
/// Read from DRIVER_IDS environment variable (comma-separated)
/// Entries that are not valid integers are skipped with a warning
pub static DRIVER_IDS: Lazy<Vec<i64>> =
    Lazy::new(|| parse_driver_ids(&env::var("DRIVER_IDS").unwrap_or_default()));

/// Parses a comma-separated list of chat IDs, keeping list order.
pub fn parse_driver_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                log::warn!("Ignoring invalid driver id in DRIVER_IDS: {:?}", s);
                None
            }
        })
        .collect()
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Order dispatch configuration
pub mod dispatch {
    use super::{env_u64, Duration, Lazy};

    /// Delay between notification sends during a broadcast (milliseconds)
    /// Keeps the driver bot under Telegram's per-bot rate limit
    pub static SEND_DELAY_MS: Lazy<u64> = Lazy::new(|| env_u64("DISPATCH_SEND_DELAY_MS", 200));

    /// Seconds a broadcast order waits for a driver before it is auto-cancelled
    pub static ORDER_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_u64("DISPATCH_ORDER_TIMEOUT_SECS", 120));

    /// Notification messages kept per driver when pruning
    pub static MESSAGE_RETENTION: Lazy<usize> =
        Lazy::new(|| env_u64("DISPATCH_MESSAGE_RETENTION", 2) as usize);

    /// Lifetime of the silent "order taken by another driver" notice (seconds)
    pub static TAKEN_NOTICE_TTL_SECS: Lazy<u64> = Lazy::new(|| env_u64("DISPATCH_TAKEN_NOTICE_TTL_SECS", 3));

    /// Lifetime of the silent "order cancelled due to timeout" notice (seconds)
    pub static TIMEOUT_NOTICE_TTL_SECS: Lazy<u64> = Lazy::new(|| env_u64("DISPATCH_TIMEOUT_NOTICE_TTL_SECS", 5));

    /// Send delay duration
    pub fn send_delay() -> Duration {
        Duration::from_millis(*SEND_DELAY_MS)
    }

    /// Order timeout duration
    pub fn order_timeout() -> Duration {
        Duration::from_secs(*ORDER_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for Telegram Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Database configuration
pub mod database {
    use super::Duration;

    /// Maximum number of pooled SQLite connections per process
    pub const MAX_POOL_SIZE: u32 = 10;

    /// How long a writer waits for another process to release the file lock
    pub const BUSY_TIMEOUT_SECS: u64 = 10;

    /// Busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_driver_ids_keeps_order_and_skips_garbage() {
        assert_eq!(parse_driver_ids("628521909, 6158974369,,abc, 42"), vec![628521909, 6158974369, 42]);
    }

    #[test]
    fn parse_driver_ids_empty() {
        assert!(parse_driver_ids("").is_empty());
        assert!(parse_driver_ids(" , ").is_empty());
    }
}
