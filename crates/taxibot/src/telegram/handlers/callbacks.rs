//! Accept / reject button presses from drivers

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use dispatchcore::dispatch::{notice, DriverId, OrderId};
use dispatchcore::{DriverResponse, ResponseOutcome};

use super::types::{HandlerDeps, HandlerError};

const NOT_A_DRIVER: &str = "This function is available to drivers only";
const NO_LONGER_AVAILABLE: &str = "❌ This order was already taken by another driver or cancelled";
const TRY_AGAIN: &str = "⚠️ Something went wrong, please try again";

/// What the driver sees after pressing a button: a short callback answer and
/// the new text of the order message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    pub answer: &'static str,
    pub alert: bool,
    pub message_text: String,
}

/// Reply for the outcome of a driver response.
pub fn callback_reply(order_id: OrderId, outcome: &ResponseOutcome) -> CallbackReply {
    match outcome {
        ResponseOutcome::NotPending => CallbackReply {
            answer: NO_LONGER_AVAILABLE,
            alert: true,
            message_text: "ℹ️ <b>Order is no longer available</b>".to_string(),
        },
        ResponseOutcome::Accepted(payload) => CallbackReply {
            answer: "✅ Order accepted",
            alert: false,
            message_text: notice::driver_order_confirmation(order_id, payload).text,
        },
        ResponseOutcome::StillPending | ResponseOutcome::AllRejected => CallbackReply {
            answer: "Order declined",
            alert: false,
            message_text: format!(
                "❌ <b>You declined order #{}</b>\n\nOther drivers can still take it.",
                order_id
            ),
        },
    }
}

pub async fn handle_order_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some((response, order_id)) = q.data.as_deref().and_then(DriverResponse::parse_callback_data) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let driver_id = q.from.id.0 as DriverId;

    if !deps.directory.contains(driver_id) {
        log::warn!("Callback {} from non-driver {}", response.callback_data(order_id), driver_id);
        bot.answer_callback_query(q.id.clone()).text(NOT_A_DRIVER).show_alert(true).await?;
        return Ok(());
    }

    let driver_name = q.from.full_name();
    let outcome = match deps
        .engine
        .process_driver_response(order_id, driver_id, response, Some(&driver_name))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("💥 Failed to process {} for order {} from driver {}: {}", response, order_id, driver_id, e);
            bot.answer_callback_query(q.id.clone()).text(TRY_AGAIN).show_alert(true).await?;
            return Ok(());
        }
    };

    let reply = callback_reply(order_id, &outcome);
    bot.answer_callback_query(q.id.clone())
        .text(reply.answer)
        .show_alert(reply.alert)
        .await?;

    if let Some(message) = q.message.as_ref() {
        if let Err(e) = bot
            .edit_message_text(message.chat().id, message.id(), reply.message_text)
            .parse_mode(ParseMode::Html)
            .await
        {
            log::warn!("Failed to edit order message for driver {}: {}", driver_id, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatchcore::OrderPayload;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stale_press_gets_alert() {
        let reply = callback_reply(3, &ResponseOutcome::NotPending);

        assert!(reply.alert);
        assert!(reply.message_text.contains("no longer available"));
    }

    #[test]
    fn test_winning_driver_keeps_order_details() {
        let payload = OrderPayload::new()
            .with("client_id", 77)
            .with("pickup_address", "Jasna 15")
            .with("destination_address", "Okopowa 2");

        let reply = callback_reply(41, &ResponseOutcome::Accepted(payload));

        assert!(!reply.alert);
        assert!(reply.message_text.contains("#41"));
        assert!(reply.message_text.contains("Jasna 15"));
        assert!(reply.message_text.contains("Okopowa 2"));
        assert!(reply.message_text.contains("<code>77</code>"));
    }

    #[test]
    fn test_rejection_reply_is_the_same_whether_or_not_it_cancelled() {
        let pending = callback_reply(41, &ResponseOutcome::StillPending);
        let cancelled = callback_reply(41, &ResponseOutcome::AllRejected);

        assert_eq!(pending, cancelled);
        assert!(pending.message_text.contains("Other drivers can still take it"));
    }
}
