//! Identifiers, response tags and the opaque order payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{AppError, AppResult};

/// Business order identifier, assigned by the caller. Always positive:
/// `0` is reserved as the "not tied to an order" marker in message records.
pub type OrderId = i64;

/// Telegram chat ID of a driver
pub type DriverId = i64;

/// Telegram chat ID of a client
pub type ClientId = i64;

/// Telegram message ID inside one chat
pub type MessageId = i32;

/// A driver's answer to a broadcast order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverResponse {
    Accept,
    Reject,
}

impl DriverResponse {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverResponse::Accept => "accept",
            DriverResponse::Reject => "reject",
        }
    }

    /// Inline button payload carrying this response, e.g. `accept_500`.
    pub fn callback_data(self, order_id: OrderId) -> String {
        format!("{}_{}", self.as_str(), order_id)
    }

    /// Parses `accept_<id>` / `reject_<id>` button payloads.
    pub fn parse_callback_data(data: &str) -> Option<(DriverResponse, OrderId)> {
        let (tag, id) = data.split_once('_')?;
        let response = tag.parse().ok()?;
        let order_id = id.parse::<OrderId>().ok().filter(|id| *id > 0)?;
        Some((response, order_id))
    }
}

impl fmt::Display for DriverResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverResponse {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(DriverResponse::Accept),
            "reject" => Ok(DriverResponse::Reject),
            other => Err(AppError::Validation(format!("unknown driver response: {}", other))),
        }
    }
}

/// Driver-facing order details (addresses, price, products, client id...).
///
/// The dispatch engine never interprets these beyond building notification
/// text and finding the client to notify.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPayload(Map<String, Value>);

impl OrderPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a payload from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AppError::Validation(format!(
                "order payload must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric field; numeric strings (`"12.5"`) are accepted too.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Client to notify about the outcome: `client_id`, falling back to `user_id`.
    pub fn client_id(&self) -> Option<ClientId> {
        ["client_id", "user_id"].iter().find_map(|key| match self.0.get(*key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn is_alcohol_delivery(&self) -> bool {
        self.get_str("order_type") == Some("alcohol_delivery")
    }
}
