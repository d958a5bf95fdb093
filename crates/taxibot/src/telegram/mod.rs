//! Telegram side of the dispatch: bots, the message channel and handlers

pub mod bot;
pub mod channel;
pub mod handlers;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use channel::TelegramChannel;
pub use handlers::{schema, HandlerDeps, HandlerError};
