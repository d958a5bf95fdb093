//! Texts sent to drivers and clients during dispatch (Telegram HTML).

use std::time::Duration;

use crate::dispatch::channel::{Action, OutgoingMessage};
use crate::dispatch::types::{DriverResponse, OrderId, OrderPayload};

const NOT_AVAILABLE: &str = "N/A";
/// Driver fee for alcohol delivery when the order does not name one (zł).
const DEFAULT_DELIVERY_FEE: &str = "20";

/// Escapes user-provided text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn field(payload: &OrderPayload, key: &str) -> String {
    field_or(payload, key, NOT_AVAILABLE)
}

fn field_or(payload: &OrderPayload, key: &str, default: &str) -> String {
    match payload.get(key) {
        Some(serde_json::Value::String(s)) => escape_html(s),
        Some(serde_json::Value::Null) | None => default.to_string(),
        Some(other) => escape_html(&other.to_string()),
    }
}

fn minutes(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{} s", secs)
    }
}

/// New-order notification with accept / reject buttons.
pub fn driver_order_notification(order_id: OrderId, payload: &OrderPayload, timeout: Duration) -> OutgoingMessage {
    let text = if payload.is_alcohol_delivery() {
        format!(
            "🛒 <b>ALCOHOL DELIVERY #{order_id}</b>\n\n\
             📝 <b>Products:</b> {}\n\
             💰 <b>Budget:</b> {} zł\n\
             📍 <b>Address:</b> {}\n\
             📏 <b>Distance:</b> ~{:.1} km\n\
             💵 <b>Your fee:</b> {} zł\n\n\
             ⏰ <b>Time to answer:</b> {}",
            field(payload, "products"),
            field(payload, "budget"),
            field(payload, "address"),
            payload.get_f64("distance").unwrap_or(5.0),
            field_or(payload, "price", DEFAULT_DELIVERY_FEE),
            minutes(timeout),
        )
    } else {
        format!(
            "🚖 <b>NEW ORDER #{order_id}</b>\n\n\
             📍 <b>From:</b> {}\n\
             📍 <b>To:</b> {}\n\
             📏 <b>Distance:</b> {:.1} km\n\
             💵 <b>Price:</b> {} zł\n\
             👥 <b>Passengers:</b> {}\n\n\
             ⏰ <b>Time to answer:</b> {}",
            field(payload, "pickup_address"),
            field(payload, "destination_address"),
            payload.get_f64("distance_km").unwrap_or(0.0),
            field(payload, "estimated_price"),
            field_or(payload, "passengers_count", "1"),
            minutes(timeout),
        )
    };

    OutgoingMessage::new(text)
        .with_action(Action::new("✅ Accept", DriverResponse::Accept.callback_data(order_id)))
        .with_action(Action::new("❌ Reject", DriverResponse::Reject.callback_data(order_id)))
}

fn client_field(payload: &OrderPayload) -> String {
    payload
        .client_id()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |id| id.to_string())
}

/// Order details for the driver who won it, replacing the accept/reject message.
pub fn driver_order_confirmation(order_id: OrderId, payload: &OrderPayload) -> OutgoingMessage {
    let text = if payload.is_alcohol_delivery() {
        format!(
            "✅ <b>You accepted delivery #{order_id}</b>\n\n\
             📝 <b>Products:</b> {}\n\
             💰 <b>Budget:</b> {} zł\n\
             📍 <b>Address:</b> {}\n\
             💵 <b>Your fee:</b> {} zł\n\
             👤 <b>Client id:</b> <code>{}</code>\n\n\
             1. Buy the products and keep the receipt\n\
             2. Deliver them to the address\n\
             3. Check the client's ID before handing over",
            field(payload, "products"),
            field(payload, "budget"),
            field(payload, "address"),
            field_or(payload, "price", DEFAULT_DELIVERY_FEE),
            client_field(payload),
        )
    } else {
        format!(
            "✅ <b>You accepted order #{order_id}</b>\n\n\
             📍 <b>From:</b> {}\n\
             📍 <b>To:</b> {}\n\
             👥 <b>Passengers:</b> {}\n\
             💵 <b>Price:</b> {} zł\n\
             👤 <b>Client id:</b> <code>{}</code>\n\n\
             Head to the pickup address.",
            field(payload, "pickup_address"),
            field(payload, "destination_address"),
            field_or(payload, "passengers_count", "1"),
            field(payload, "estimated_price"),
            client_field(payload),
        )
    };
    OutgoingMessage::new(text)
}

/// Tells the client a driver took the order. `driver_name` is shown when known.
pub fn client_driver_accepted(order_id: OrderId, payload: &OrderPayload, driver_name: Option<&str>) -> OutgoingMessage {
    let driver_line = driver_name
        .map(|name| format!("👤 <b>Driver:</b> {}\n", escape_html(name)))
        .unwrap_or_default();

    let text = if payload.is_alcohol_delivery() {
        let budget = match payload.get("budget") {
            Some(serde_json::Value::Null) | None => String::new(),
            Some(_) => format!(" (up to {} zł)", field(payload, "budget")),
        };
        format!(
            "✅ <b>A driver accepted your shopping order #{order_id}</b>\n\n\
             {driver_line}\
             🕒 <b>Estimated time:</b> ~30-45 min\n\n\
             💵 <b>To pay:</b>\n\
             - Service fee: {} zł\n\
             - Products{budget}\n\n\
             ⚠️ Have your ID card and cash for the full amount ready.",
            field_or(payload, "price", DEFAULT_DELIVERY_FEE),
        )
    } else {
        format!(
            "✅ <b>A driver accepted your order #{order_id}</b>\n\n\
             {driver_line}\
             📍 <b>From:</b> {}\n\
             📍 <b>To:</b> {}\n\
             💵 <b>Price:</b> {} zł\n\n\
             🚖 The driver is on the way.",
            field(payload, "pickup_address"),
            field(payload, "destination_address"),
            field(payload, "estimated_price"),
        )
    };
    OutgoingMessage::new(text)
}

pub fn order_taken_notice(order_id: OrderId) -> OutgoingMessage {
    OutgoingMessage::new(format!("✅ <b>Order #{} was taken by another driver</b>", order_id)).silent()
}

pub fn order_timeout_notice(order_id: OrderId) -> OutgoingMessage {
    OutgoingMessage::new(format!("⏰ <b>Order #{} was cancelled: no answer in time</b>", order_id)).silent()
}

pub fn client_no_drivers() -> OutgoingMessage {
    OutgoingMessage::new(
        "😞 <b>No drivers available</b>\n\n\
         Sorry, no driver is available right now.\n\
         Please try again in a few minutes.",
    )
}

pub fn client_all_declined() -> OutgoingMessage {
    OutgoingMessage::new(
        "😞 <b>We're sorry</b>\n\n\
         All available drivers are busy at the moment.\n\
         Please try again in a few minutes.",
    )
}

pub fn client_timed_out() -> OutgoingMessage {
    OutgoingMessage::new(
        "⏰ <b>Waiting time is over</b>\n\n\
         No driver answered your order.\n\
         Please try again.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn ride_notification_carries_both_actions() {
        let payload = OrderPayload::from_value(json!({
            "pickup_address": "Jasna 15",
            "destination_address": "<script>",
            "distance_km": 4.26,
            "estimated_price": 22.8,
            "passengers_count": 2
        }))
        .unwrap();

        let msg = driver_order_notification(500, &payload, Duration::from_secs(120));

        assert!(msg.text.contains("#500"));
        assert!(msg.text.contains("Jasna 15"));
        assert!(msg.text.contains("&lt;script&gt;"));
        assert!(msg.text.contains("4.3 km"));
        assert!(msg.text.contains("2 min"));
        assert!(!msg.silent);
        let data: Vec<&str> = msg.actions.iter().map(|a| a.callback_data.as_str()).collect();
        assert_eq!(data, vec!["accept_500", "reject_500"]);
    }

    #[test]
    fn alcohol_notification_uses_delivery_fields() {
        let payload = OrderPayload::new()
            .with("order_type", "alcohol_delivery")
            .with("products", "2x wine")
            .with("budget", 150);

        let msg = driver_order_notification(7, &payload, Duration::from_secs(90));

        assert!(msg.text.contains("ALCOHOL DELIVERY #7"));
        assert!(msg.text.contains("2x wine"));
        assert!(msg.text.contains("150 zł"));
        assert!(msg.text.contains("90 s"));
    }

    #[test]
    fn alcohol_fee_defaults_to_standard_fee() {
        let payload = OrderPayload::new().with("order_type", "alcohol_delivery");

        let msg = driver_order_notification(8, &payload, Duration::from_secs(120));

        assert!(msg.text.contains("Your fee:</b> 20 zł"));
    }

    #[test]
    fn confirmation_keeps_order_details() {
        let payload = OrderPayload::new()
            .with("client_id", 555)
            .with("pickup_address", "Jasna 15")
            .with("destination_address", "Nowy Świat 3")
            .with("passengers_count", 3)
            .with("estimated_price", 31.5);

        let msg = driver_order_confirmation(12, &payload);

        assert!(msg.text.contains("#12"));
        assert!(msg.text.contains("Jasna 15"));
        assert!(msg.text.contains("Nowy Świat 3"));
        assert!(msg.text.contains("Passengers:</b> 3"));
        assert!(msg.text.contains("31.5 zł"));
        assert!(msg.text.contains("<code>555</code>"));
        assert!(msg.actions.is_empty());
    }

    #[test]
    fn client_acceptance_names_the_driver_when_known() {
        let payload = OrderPayload::new().with("pickup_address", "Jasna 15");

        let named = client_driver_accepted(4, &payload, Some("Jan <K>"));
        let anonymous = client_driver_accepted(4, &payload, None);

        assert!(named.text.contains("Driver:</b> Jan &lt;K&gt;"));
        assert!(!anonymous.text.contains("Driver:"));
        assert!(anonymous.text.contains("accepted your order #4"));
        assert!(!named.silent);
    }

    #[test]
    fn driver_notices_are_silent() {
        assert!(order_taken_notice(1).silent);
        assert!(order_timeout_notice(1).silent);
        assert!(order_taken_notice(1).actions.is_empty());
    }
}
