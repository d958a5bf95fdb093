//! Driver bot commands

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use dispatchcore::dispatch::DriverId;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let is_driver = deps.directory.contains(chat_id.0 as DriverId);

    let text = match cmd {
        Command::Start if is_driver => format!(
            "🚖 <b>You are registered as a driver</b>\n\nNew orders will appear here.\nYour id: <code>{}</code>",
            chat_id.0
        ),
        Command::Start => format!(
            "⛔ <b>You are not on the driver list</b>\n\nAsk the dispatcher to add your id: <code>{}</code>",
            chat_id.0
        ),
        Command::Pending if is_driver => {
            let pending = deps.engine.all_pending_order_ids()?;
            if pending.is_empty() {
                "📭 No orders are waiting for a driver".to_string()
            } else {
                let ids: Vec<String> = pending.iter().map(|id| format!("#{}", id)).collect();
                format!("📬 <b>Orders waiting for a driver:</b> {}", ids.join(", "))
            }
        }
        Command::Pending => "This function is available to drivers only".to_string(),
    };

    bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}
