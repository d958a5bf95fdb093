//! dispatchcore - multi-driver order dispatch for the taxi and delivery bots.
//!
//! The client bot broadcasts an order to every registered driver; the driver
//! bot feeds accept / reject callbacks back in. Both processes share one
//! SQLite database, which is the only state they coordinate through.
//!
//! Telegram is kept behind the [`dispatch::MessageChannel`] seam. The
//! optional `telegram` feature only adds the `teloxide::RequestError`
//! conversion on [`AppError`].

pub mod core;
pub mod dispatch;
pub mod storage;

pub use crate::core::{AppError, AppResult};
pub use dispatch::{
    BroadcastOutcome, DispatchEngine, DispatchSettings, DriverDirectory, DriverResponse, MessageChannel, OrderPayload,
    ResponseOutcome, StaticDirectory,
};
pub use storage::{DispatchStore, SqliteStore};
