//! Shared SQLite storage for the dispatch engine

pub mod db;
pub mod migrations;
pub mod orders;

// Re-exports for convenience
pub use db::{create_in_memory_pool, create_pool, get_connection, DbPool};
pub use orders::{DispatchStore, DriverMessage, SqliteStore};
