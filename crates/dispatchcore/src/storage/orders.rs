//! Shared store for pending orders, driver responses and driver messages.
//!
//! Both bot processes open the same SQLite file, so every write here is
//! visible to the other process on its next read. Nothing is cached.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::error::AppResult;
use crate::dispatch::types::{DriverId, DriverResponse, MessageId, OrderId, OrderPayload};
use crate::storage::db::{self, get_connection, DbPool};

/// `order_id` stored for messages that no longer belong to an active order.
const NO_ORDER: OrderId = 0;

/// A notification message previously sent to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverMessage {
    pub message_id: MessageId,
    /// `None` once the message was kept by pruning and detached from its order.
    pub order_id: Option<OrderId>,
}

/// Storage the dispatch engine depends on.
///
/// Every method is a short single-key operation; implementations must make
/// each write immediately visible to other processes sharing the store.
pub trait DispatchStore: Send + Sync {
    /// Inserts or replaces the pending order record.
    fn put_order(&self, order_id: OrderId, payload: &OrderPayload) -> AppResult<()>;

    fn get_order(&self, order_id: OrderId) -> AppResult<Option<OrderPayload>>;

    /// Deletes the order together with its responses and message records.
    ///
    /// Returns `true` only for the call that actually removed the pending
    /// record, which makes it usable as an atomic "claim" between racing
    /// resolvers. Removing an absent order is a no-op returning `false`.
    fn remove_order(&self, order_id: OrderId) -> AppResult<bool>;

    fn list_order_ids(&self) -> AppResult<Vec<OrderId>>;

    /// Records (or overwrites) a driver's response, but only while the order
    /// is still pending. Returns `false` when the order is gone.
    fn record_response(&self, order_id: OrderId, driver_id: DriverId, response: DriverResponse) -> AppResult<bool>;

    fn get_responses(&self, order_id: OrderId) -> AppResult<BTreeMap<DriverId, DriverResponse>>;

    fn add_message(&self, driver_id: DriverId, message_id: MessageId, order_id: Option<OrderId>) -> AppResult<()>;

    /// Messages sent to the driver, oldest first.
    fn driver_messages(&self, driver_id: DriverId) -> AppResult<Vec<DriverMessage>>;

    fn remove_driver_messages(&self, driver_id: DriverId) -> AppResult<()>;
}

impl ToSql for DriverResponse {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DriverResponse {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: crate::core::AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// [`DispatchStore`] backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<DbPool>,
}

impl SqliteStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Opens the database file, creating and migrating it if needed.
    pub fn open(database_path: &str) -> AppResult<Self> {
        Ok(Self::new(Arc::new(db::create_pool(database_path)?)))
    }

    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::new(Arc::new(db::create_in_memory_pool()?)))
    }
}

impl DispatchStore for SqliteStore {
    fn put_order(&self, order_id: OrderId, payload: &OrderPayload) -> AppResult<()> {
        let order_data = serde_json::to_string(payload)?;
        let conn = get_connection(&self.pool)?;
        conn.execute(
            "INSERT OR REPLACE INTO pending_orders (order_id, order_data) VALUES (?1, ?2)",
            params![order_id, order_data],
        )?;
        log::debug!("Order {} stored as pending", order_id);
        Ok(())
    }

    fn get_order(&self, order_id: OrderId) -> AppResult<Option<OrderPayload>> {
        let conn = get_connection(&self.pool)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT order_data FROM pending_orders WHERE order_id = ?1",
                params![order_id],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn remove_order(&self, order_id: OrderId) -> AppResult<bool> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM pending_orders WHERE order_id = ?1", params![order_id])?;
        tx.execute("DELETE FROM driver_responses WHERE order_id = ?1", params![order_id])?;
        tx.execute("DELETE FROM driver_messages WHERE order_id = ?1", params![order_id])?;
        tx.commit()?;

        if removed > 0 {
            log::debug!("Order {} removed from pending storage", order_id);
        }
        Ok(removed > 0)
    }

    fn list_order_ids(&self) -> AppResult<Vec<OrderId>> {
        let conn = get_connection(&self.pool)?;
        let mut stmt = conn.prepare("SELECT order_id FROM pending_orders ORDER BY order_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<OrderId>, _>>()?;
        Ok(ids)
    }

    fn record_response(&self, order_id: OrderId, driver_id: DriverId, response: DriverResponse) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        let changed = conn.execute(
            "INSERT OR REPLACE INTO driver_responses (order_id, driver_id, response)
             SELECT ?1, ?2, ?3
             WHERE EXISTS (SELECT 1 FROM pending_orders WHERE order_id = ?1)",
            params![order_id, driver_id, response],
        )?;
        Ok(changed > 0)
    }

    fn get_responses(&self, order_id: OrderId) -> AppResult<BTreeMap<DriverId, DriverResponse>> {
        let conn = get_connection(&self.pool)?;
        let mut stmt = conn.prepare("SELECT driver_id, response FROM driver_responses WHERE order_id = ?1")?;
        let responses = stmt
            .query_map(params![order_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<DriverId, DriverResponse>, _>>()?;
        Ok(responses)
    }

    fn add_message(&self, driver_id: DriverId, message_id: MessageId, order_id: Option<OrderId>) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        conn.execute(
            "INSERT OR REPLACE INTO driver_messages (driver_id, message_id, order_id) VALUES (?1, ?2, ?3)",
            params![driver_id, message_id, order_id.unwrap_or(NO_ORDER)],
        )?;
        Ok(())
    }

    fn driver_messages(&self, driver_id: DriverId) -> AppResult<Vec<DriverMessage>> {
        let conn = get_connection(&self.pool)?;
        // Telegram message ids grow monotonically within a chat.
        let mut stmt = conn.prepare(
            "SELECT message_id, order_id FROM driver_messages WHERE driver_id = ?1 ORDER BY message_id ASC",
        )?;
        let messages = stmt
            .query_map(params![driver_id], |row| {
                let order_id: OrderId = row.get(1)?;
                Ok(DriverMessage {
                    message_id: row.get(0)?,
                    order_id: (order_id != NO_ORDER).then_some(order_id),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn remove_driver_messages(&self, driver_id: DriverId) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        conn.execute("DELETE FROM driver_messages WHERE driver_id = ?1", params![driver_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn payload() -> OrderPayload {
        OrderPayload::from_value(json!({
            "client_id": 111,
            "pickup_address": "Plac Żołnierza 1",
            "estimated_price": 42.5
        }))
        .unwrap()
    }

    // ── pending orders ───────────────────────────────────────────────────────

    #[test]
    fn put_and_get_order_roundtrips_payload() {
        let store = make_store();
        store.put_order(500, &payload()).unwrap();

        assert_eq!(store.get_order(500).unwrap(), Some(payload()));
        assert_eq!(store.get_order(501).unwrap(), None);
        assert_eq!(store.list_order_ids().unwrap(), vec![500]);
    }

    #[test]
    fn put_order_overwrites_same_id() {
        let store = make_store();
        store.put_order(7, &payload()).unwrap();
        store.put_order(7, &OrderPayload::new().with("client_id", 2)).unwrap();

        assert_eq!(store.list_order_ids().unwrap(), vec![7]);
        assert_eq!(store.get_order(7).unwrap().unwrap().client_id(), Some(2));
    }

    #[test]
    fn remove_order_claims_only_once() {
        let store = make_store();
        store.put_order(9, &payload()).unwrap();

        assert!(store.remove_order(9).unwrap(), "first removal claims the order");
        assert!(!store.remove_order(9).unwrap(), "second removal must be a no-op");
        assert!(store.list_order_ids().unwrap().is_empty());
    }

    #[test]
    fn remove_order_drops_responses_and_order_messages() {
        let store = make_store();
        store.put_order(10, &payload()).unwrap();
        store.record_response(10, 1, DriverResponse::Reject).unwrap();
        store.add_message(1, 100, Some(10)).unwrap();
        store.add_message(1, 90, None).unwrap();

        store.remove_order(10).unwrap();

        assert!(store.get_responses(10).unwrap().is_empty());
        assert_eq!(
            store.driver_messages(1).unwrap(),
            vec![DriverMessage {
                message_id: 90,
                order_id: None
            }],
            "detached messages survive order cleanup"
        );
    }

    // ── responses ────────────────────────────────────────────────────────────

    #[test]
    fn record_response_last_write_wins() {
        let store = make_store();
        store.put_order(11, &payload()).unwrap();

        assert!(store.record_response(11, 1, DriverResponse::Reject).unwrap());
        assert!(store.record_response(11, 1, DriverResponse::Accept).unwrap());
        assert!(store.record_response(11, 2, DriverResponse::Reject).unwrap());

        let responses = store.get_responses(11).unwrap();
        assert_eq!(responses.get(&1), Some(&DriverResponse::Accept));
        assert_eq!(responses.get(&2), Some(&DriverResponse::Reject));
    }

    #[test]
    fn record_response_ignored_for_unknown_order() {
        let store = make_store();
        assert!(!store.record_response(12, 1, DriverResponse::Accept).unwrap());
        assert!(store.get_responses(12).unwrap().is_empty());
    }

    // ── driver messages ──────────────────────────────────────────────────────

    #[test]
    fn driver_messages_are_oldest_first() {
        let store = make_store();
        store.add_message(5, 30, Some(1)).unwrap();
        store.add_message(5, 10, Some(2)).unwrap();
        store.add_message(5, 20, None).unwrap();
        store.add_message(6, 1, Some(1)).unwrap();

        let ids: Vec<MessageId> = store.driver_messages(5).unwrap().iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        store.remove_driver_messages(5).unwrap();
        assert!(store.driver_messages(5).unwrap().is_empty());
        assert_eq!(store.driver_messages(6).unwrap().len(), 1);
    }
}
