//! Outbound messaging seam.
//!
//! The dispatch core has zero teloxide dependency: it talks to chats through
//! [`MessageChannel`], and the bot crate supplies the Telegram implementation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::types::{ClientId, DriverId, MessageId};

/// Who a message goes to. Drivers and clients talk to different bots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Driver(DriverId),
    Client(ClientId),
}

/// Inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub callback_data: String,
}

impl Action {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// An HTML-formatted message ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub actions: Vec<Action>,
    /// Deliver without a notification sound.
    pub silent: bool,
}

impl OutgoingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
            silent: false,
        }
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Error, Debug)]
pub enum ChannelError {
    /// The message was already deleted or can no longer be touched.
    /// Deleting it again is treated as success.
    #[error("message not found or already deleted")]
    MessageGone,

    /// The recipient could not be reached (blocked bot, network, rate limit...).
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Sends and deletes chat messages on behalf of the dispatch engine.
///
/// Failures are scoped to a single recipient. The engine logs them and moves
/// on to the next recipient: one unreachable driver never aborts a broadcast
/// or an arbitration decision. Implementations should therefore return errors
/// rather than retrying internally for long.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Sends a message and returns its ID in the recipient's chat.
    async fn send(&self, recipient: Recipient, message: OutgoingMessage) -> Result<MessageId, ChannelError>;

    /// Deletes a previously sent message.
    async fn delete(&self, recipient: Recipient, message_id: MessageId) -> Result<(), ChannelError>;
}

/// Deletes a message, treating "already gone" as success and logging any
/// other failure.
pub async fn delete_quietly(channel: &dyn MessageChannel, recipient: Recipient, message_id: MessageId) {
    match channel.delete(recipient, message_id).await {
        Ok(()) | Err(ChannelError::MessageGone) => {}
        Err(e) => log::warn!("⚠️ Could not delete message {} for {:?}: {}", message_id, recipient, e),
    }
}

/// Deletes a message after `delay` in a background task.
pub fn delete_after(channel: Arc<dyn MessageChannel>, recipient: Recipient, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        delete_quietly(channel.as_ref(), recipient, message_id).await;
        log::debug!("Auto-deleted message {} for {:?} after {:?}", message_id, recipient, delay);
    });
}
