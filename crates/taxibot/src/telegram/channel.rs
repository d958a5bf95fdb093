//! `MessageChannel` over the Telegram Bot API.
//!
//! Clients and drivers talk to two different bots, so a [`Recipient`] picks the
//! bot as well as the chat.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId as TgMessageId, ParseMode};
use teloxide::{ApiError, RequestError};

use dispatchcore::dispatch::{Action, ChannelError, MessageChannel, MessageId, OutgoingMessage, Recipient};

#[derive(Clone)]
pub struct TelegramChannel {
    client_bot: Bot,
    driver_bot: Bot,
}

impl TelegramChannel {
    pub fn new(client_bot: Bot, driver_bot: Bot) -> Self {
        Self { client_bot, driver_bot }
    }

    fn route(&self, recipient: Recipient) -> (&Bot, ChatId) {
        match recipient {
            Recipient::Driver(id) => (&self.driver_bot, ChatId(id)),
            Recipient::Client(id) => (&self.client_bot, ChatId(id)),
        }
    }
}

/// All actions go on a single keyboard row.
pub fn keyboard(actions: &[Action]) -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = actions
        .iter()
        .map(|a| InlineKeyboardButton::callback(a.label.clone(), a.callback_data.clone()))
        .collect();
    InlineKeyboardMarkup::new(vec![row])
}

pub fn to_channel_error(err: RequestError) -> ChannelError {
    match err {
        RequestError::Api(
            ApiError::MessageToDeleteNotFound | ApiError::MessageCantBeDeleted | ApiError::MessageIdInvalid,
        ) => ChannelError::MessageGone,
        other => ChannelError::Delivery(other.to_string()),
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    async fn send(&self, recipient: Recipient, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        let (bot, chat_id) = self.route(recipient);

        let mut request = bot
            .send_message(chat_id, message.text)
            .parse_mode(ParseMode::Html)
            .disable_notification(message.silent);
        if !message.actions.is_empty() {
            request = request.reply_markup(keyboard(&message.actions));
        }

        let sent = request.await.map_err(to_channel_error)?;
        Ok(sent.id.0)
    }

    async fn delete(&self, recipient: Recipient, message_id: MessageId) -> Result<(), ChannelError> {
        let (bot, chat_id) = self.route(recipient);
        bot.delete_message(chat_id, TgMessageId(message_id))
            .await
            .map_err(to_channel_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatchcore::DriverResponse;
    use pretty_assertions::assert_eq;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_missing_message_maps_to_gone() {
        assert!(matches!(
            to_channel_error(RequestError::Api(ApiError::MessageToDeleteNotFound)),
            ChannelError::MessageGone
        ));
        assert!(matches!(
            to_channel_error(RequestError::Api(ApiError::MessageCantBeDeleted)),
            ChannelError::MessageGone
        ));
    }

    #[test]
    fn test_blocked_bot_is_a_delivery_failure() {
        assert!(matches!(
            to_channel_error(RequestError::Api(ApiError::BotBlocked)),
            ChannelError::Delivery(_)
        ));
    }

    #[test]
    fn test_keyboard_keeps_action_order_on_one_row() {
        let actions = vec![
            Action::new("✅ Accept", DriverResponse::Accept.callback_data(5)),
            Action::new("❌ Reject", DriverResponse::Reject.callback_data(5)),
        ];

        let markup = keyboard(&actions);

        assert_eq!(markup.inline_keyboard.len(), 1);
        let data: Vec<String> = markup.inline_keyboard[0]
            .iter()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["accept_5".to_string(), "reject_5".to_string()]);
    }
}
