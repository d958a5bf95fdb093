//! Shared fixtures for dispatch engine tests
//!
//! `RecordingChannel` stands in for Telegram: it hands out increasing message
//! IDs, remembers everything sent and deleted, and can be told to fail for
//! chosen drivers.

#![allow(dead_code)]

use async_trait::async_trait;
use dispatchcore::dispatch::{ChannelError, DriverId, MessageChannel, MessageId, OrderId, OutgoingMessage, Recipient};
use dispatchcore::storage::DriverMessage;
use dispatchcore::{
    AppError, AppResult, DispatchEngine, DispatchSettings, DispatchStore, DriverResponse, OrderPayload, SqliteStore,
    StaticDirectory,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CLIENT_ID: i64 = 9001;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: Recipient,
    pub message_id: MessageId,
    pub message: OutgoingMessage,
}

#[derive(Default)]
pub struct RecordingChannel {
    next_id: AtomicI32,
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<(Recipient, MessageId)>>,
    unreachable: Mutex<HashSet<i64>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every send to this driver fails with a delivery error.
    pub fn make_unreachable(&self, driver_id: i64) {
        self.unreachable.lock().unwrap().insert(driver_id);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: Recipient) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.recipient == recipient).collect()
    }

    pub fn texts_to(&self, recipient: Recipient) -> Vec<String> {
        self.sent_to(recipient).into_iter().map(|m| m.message.text).collect()
    }

    pub fn deleted(&self) -> Vec<(Recipient, MessageId)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deleted_for(&self, recipient: Recipient) -> Vec<MessageId> {
        self.deleted()
            .into_iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, id)| id)
            .collect()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, recipient: Recipient, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        if let Recipient::Driver(id) = recipient {
            if self.unreachable.lock().unwrap().contains(&id) {
                return Err(ChannelError::Delivery(format!("bot was blocked by driver {}", id)));
            }
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(SentMessage {
            recipient,
            message_id,
            message,
        });
        Ok(message_id)
    }

    async fn delete(&self, recipient: Recipient, message_id: MessageId) -> Result<(), ChannelError> {
        let known = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.recipient == recipient && m.message_id == message_id);
        if !known {
            return Err(ChannelError::MessageGone);
        }
        self.deleted.lock().unwrap().push((recipient, message_id));
        Ok(())
    }
}

/// Settings with no send delay and short timers.
pub fn fast_settings() -> DispatchSettings {
    DispatchSettings {
        send_delay: Duration::ZERO,
        order_timeout: Duration::from_secs(60),
        message_retention: 2,
        taken_notice_ttl: Duration::from_millis(50),
        timeout_notice_ttl: Duration::from_millis(50),
    }
}

pub struct Harness {
    pub engine: DispatchEngine,
    pub store: Arc<SqliteStore>,
    pub channel: Arc<RecordingChannel>,
    pub directory: Arc<StaticDirectory>,
}

pub fn harness(drivers: &[i64]) -> Harness {
    harness_with(drivers, fast_settings())
}

pub fn harness_with(drivers: &[i64], settings: DispatchSettings) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    harness_on(store, drivers, settings)
}

pub fn harness_on(store: Arc<SqliteStore>, drivers: &[i64], settings: DispatchSettings) -> Harness {
    let channel = RecordingChannel::new();
    let directory = Arc::new(StaticDirectory::new(drivers.to_vec()));
    let engine = DispatchEngine::new(store.clone(), channel.clone(), directory.clone(), settings);
    Harness {
        engine,
        store,
        channel,
        directory,
    }
}

/// Wraps a working store but fails every order insert, like a locked database.
pub struct FailingInsertStore {
    inner: SqliteStore,
}

impl FailingInsertStore {
    pub fn in_memory() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
        }
    }
}

impl DispatchStore for FailingInsertStore {
    fn put_order(&self, _order_id: OrderId, _payload: &OrderPayload) -> AppResult<()> {
        Err(AppError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )))
    }

    fn get_order(&self, order_id: OrderId) -> AppResult<Option<OrderPayload>> {
        self.inner.get_order(order_id)
    }

    fn remove_order(&self, order_id: OrderId) -> AppResult<bool> {
        self.inner.remove_order(order_id)
    }

    fn list_order_ids(&self) -> AppResult<Vec<OrderId>> {
        self.inner.list_order_ids()
    }

    fn record_response(&self, order_id: OrderId, driver_id: DriverId, response: DriverResponse) -> AppResult<bool> {
        self.inner.record_response(order_id, driver_id, response)
    }

    fn get_responses(&self, order_id: OrderId) -> AppResult<BTreeMap<DriverId, DriverResponse>> {
        self.inner.get_responses(order_id)
    }

    fn add_message(&self, driver_id: DriverId, message_id: MessageId, order_id: Option<OrderId>) -> AppResult<()> {
        self.inner.add_message(driver_id, message_id, order_id)
    }

    fn driver_messages(&self, driver_id: DriverId) -> AppResult<Vec<DriverMessage>> {
        self.inner.driver_messages(driver_id)
    }

    fn remove_driver_messages(&self, driver_id: DriverId) -> AppResult<()> {
        self.inner.remove_driver_messages(driver_id)
    }
}

pub fn ride_payload() -> OrderPayload {
    OrderPayload::new()
        .with("client_id", CLIENT_ID)
        .with("pickup_address", "Jasna 15")
        .with("destination_address", "Marszałkowska 100")
        .with("distance_km", 3.2)
        .with("estimated_price", 24.5)
        .with("passengers_count", 1)
}
