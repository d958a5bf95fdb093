//! Multi-driver order dispatch.
//!
//! One order is broadcast to every driver in the directory. Drivers answer
//! accept or reject; the first accept wins, the order is cancelled once every
//! driver rejected, and an unclaimed order is cancelled when its timer fires.
//!
//! All order state lives in the shared [`DispatchStore`]. The engine itself
//! only remembers the timeout task handles of the orders it broadcast, so a
//! second process (the driver bot) can arbitrate responses for orders
//! broadcast by the first one (the client bot).
//!
//! Every terminal transition goes through [`DispatchStore::remove_order`],
//! which reports whether *this* call removed the pending record. Only that
//! caller notifies anybody, so racing resolvers (two accepts, accept vs
//! timeout, last reject vs timeout) produce exactly one outcome.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::dispatch::channel::{delete_after, delete_quietly, ChannelError, MessageChannel, OutgoingMessage, Recipient};
use crate::dispatch::directory::DriverDirectory;
use crate::dispatch::notice;
use crate::dispatch::types::{DriverId, DriverResponse, MessageId, OrderId, OrderPayload};
use crate::storage::DispatchStore;

/// Tunables of the dispatch engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Pause between two notification sends of one broadcast.
    pub send_delay: Duration,
    /// How long an order waits for a driver before it is auto-cancelled.
    pub order_timeout: Duration,
    /// Notification messages kept per driver when pruning.
    pub message_retention: usize,
    /// Lifetime of the silent "taken by another driver" notice.
    pub taken_notice_ttl: Duration,
    /// Lifetime of the silent "cancelled due to timeout" notice.
    pub timeout_notice_ttl: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_millis(200),
            order_timeout: Duration::from_secs(120),
            message_retention: 2,
            taken_notice_ttl: Duration::from_secs(3),
            timeout_notice_ttl: Duration::from_secs(5),
        }
    }
}

impl DispatchSettings {
    /// Snapshot of the `DISPATCH_*` environment configuration.
    pub fn from_config() -> Self {
        Self {
            send_delay: config::dispatch::send_delay(),
            order_timeout: config::dispatch::order_timeout(),
            message_retention: *config::dispatch::MESSAGE_RETENTION,
            taken_notice_ttl: Duration::from_secs(*config::dispatch::TAKEN_NOTICE_TTL_SECS),
            timeout_notice_ttl: Duration::from_secs(*config::dispatch::TIMEOUT_NOTICE_TTL_SECS),
        }
    }
}

/// Result of [`DispatchEngine::broadcast_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// At least one driver got the order; it is pending with a running timer.
    Pending { notified: usize },
    /// Nobody could be notified; the client was told and the order dropped.
    NoDrivers,
}

/// Result of [`DispatchEngine::process_driver_response`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// This driver won the order. Carries the claimed payload, which is no
    /// longer in the store.
    Accepted(OrderPayload),
    /// Rejection recorded; other drivers can still accept.
    StillPending,
    /// Every driver has rejected and the order was cancelled.
    AllRejected,
    /// The order is not pending (taken, cancelled, timed out or unknown).
    /// Nothing was written.
    NotPending,
}

impl ResponseOutcome {
    /// Whether the response was processed against a pending order.
    pub fn is_processed(&self) -> bool {
        !matches!(self, ResponseOutcome::NotPending)
    }
}

struct TimeoutTask {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct DispatchEngine {
    store: Arc<dyn DispatchStore>,
    channel: Arc<dyn MessageChannel>,
    directory: Arc<dyn DriverDirectory>,
    settings: DispatchSettings,
    timers: Arc<Mutex<HashMap<OrderId, TimeoutTask>>>,
    timer_generation: Arc<AtomicU64>,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        channel: Arc<dyn MessageChannel>,
        directory: Arc<dyn DriverDirectory>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            channel,
            directory,
            settings,
            timers: Arc::new(Mutex::new(HashMap::new())),
            timer_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    // ── broadcast ────────────────────────────────────────────────────────────

    /// Sends the order to every driver in the directory and starts its timer.
    ///
    /// The pending record is written before any message goes out; if that
    /// write fails the error is returned and nobody is notified. Per-driver
    /// delivery failures are logged and skipped. When no driver at all could
    /// be reached the client is told so and the order is dropped right away.
    /// An empty driver list never creates a pending record.
    ///
    /// Callers must not re-broadcast an order that is still pending.
    pub async fn broadcast_order(&self, order_id: OrderId, payload: OrderPayload) -> AppResult<BroadcastOutcome> {
        if order_id <= 0 {
            return Err(AppError::Validation(format!("order id must be positive, got {}", order_id)));
        }

        let drivers = self.directory.list_drivers();
        if drivers.is_empty() {
            log::warn!("⚠️ Driver list is empty, order {} cannot be broadcast", order_id);
            self.notify_client(order_id, &payload, notice::client_no_drivers()).await;
            return Ok(BroadcastOutcome::NoDrivers);
        }

        self.store.put_order(order_id, &payload)?;
        log::info!("🚀 Broadcasting order {} to {} drivers", order_id, drivers.len());

        let notification = notice::driver_order_notification(order_id, &payload, self.settings.order_timeout);
        let mut notified = 0usize;

        for (idx, &driver_id) in drivers.iter().enumerate() {
            if idx > 0 && !self.settings.send_delay.is_zero() {
                tokio::time::sleep(self.settings.send_delay).await;
            }

            match self.send_clean_notification(driver_id, order_id, notification.clone()).await {
                Ok(message_id) => {
                    notified += 1;
                    log::info!(
                        "✅ Order {} sent to driver {} (message {})",
                        order_id,
                        driver_id,
                        message_id
                    );
                }
                Err(e) => log::warn!("❌ Failed to notify driver {} about order {}: {}", driver_id, order_id, e),
            }
        }

        if notified > 0 {
            self.schedule_timeout(order_id);
            log::info!(
                "🎯 Order {} pending: {}/{} drivers notified, timeout {:?}",
                order_id,
                notified,
                drivers.len(),
                self.settings.order_timeout
            );
            return Ok(BroadcastOutcome::Pending { notified });
        }

        log::warn!("⚠️ No driver could be notified about order {}", order_id);
        if self.store.remove_order(order_id)? {
            self.notify_client(order_id, &payload, notice::client_no_drivers()).await;
        }
        Ok(BroadcastOutcome::NoDrivers)
    }

    /// Prunes the driver's stale messages, then sends the notification and
    /// records its message ID against the order.
    async fn send_clean_notification(
        &self,
        driver_id: DriverId,
        order_id: OrderId,
        notification: OutgoingMessage,
    ) -> Result<MessageId, ChannelError> {
        let room_for_new = self.settings.message_retention.saturating_sub(1);
        if let Err(e) = self.prune_to(driver_id, room_for_new).await {
            log::warn!("⚠️ Could not clean up old messages for driver {}: {}", driver_id, e);
        }

        let message_id = self.channel.send(Recipient::Driver(driver_id), notification).await?;

        // The notification is already out; a failed record only means it will
        // not be pruned later.
        if let Err(e) = self.store.add_message(driver_id, message_id, Some(order_id)) {
            log::warn!(
                "⚠️ Could not record message {} for driver {}: {}",
                message_id,
                driver_id,
                e
            );
        }
        Ok(message_id)
    }

    /// Deletes the driver's oldest notification messages so that at most
    /// `message_retention` of them are left, and detaches the kept ones from
    /// their orders. Returns how many messages were deleted.
    pub async fn prune_driver_messages(&self, driver_id: DriverId) -> AppResult<usize> {
        self.prune_to(driver_id, self.settings.message_retention).await
    }

    async fn prune_to(&self, driver_id: DriverId, keep: usize) -> AppResult<usize> {
        let messages = self.store.driver_messages(driver_id)?;
        if messages.len() <= keep {
            return Ok(0);
        }

        let (stale, kept) = messages.split_at(messages.len() - keep);
        for message in stale {
            delete_quietly(self.channel.as_ref(), Recipient::Driver(driver_id), message.message_id).await;
            log::debug!("🗑️ Deleted old message {} for driver {}", message.message_id, driver_id);
        }

        self.store.remove_driver_messages(driver_id)?;
        for message in kept {
            self.store.add_message(driver_id, message.message_id, None)?;
        }
        Ok(stale.len())
    }

    // ── arbitration ──────────────────────────────────────────────────────────

    /// Processes a driver's accept or reject.
    ///
    /// Returns `Ok(false)` when the order is not pending (already taken,
    /// cancelled, timed out or unknown); nothing is written in that case and
    /// the caller should tell the driver the order is no longer available.
    pub async fn handle_driver_response(
        &self,
        order_id: OrderId,
        driver_id: DriverId,
        response: DriverResponse,
    ) -> AppResult<bool> {
        let outcome = self.process_driver_response(order_id, driver_id, response, None).await?;
        Ok(outcome.is_processed())
    }

    /// Like [`Self::handle_driver_response`], but reports what happened and
    /// hands the payload back to the winning driver's caller.
    ///
    /// `driver_name` is shown to the client in the acceptance notice.
    pub async fn process_driver_response(
        &self,
        order_id: OrderId,
        driver_id: DriverId,
        response: DriverResponse,
        driver_name: Option<&str>,
    ) -> AppResult<ResponseOutcome> {
        log::info!("🎬 Driver {} answered {} for order {}", driver_id, response, order_id);

        let Some(payload) = self.store.get_order(order_id)? else {
            log::info!("⚠️ Order {} is not pending, ignoring {} from driver {}", order_id, response, driver_id);
            return Ok(ResponseOutcome::NotPending);
        };

        if !self.store.record_response(order_id, driver_id, response)? {
            log::info!("⚠️ Order {} was resolved while driver {} answered", order_id, driver_id);
            return Ok(ResponseOutcome::NotPending);
        }

        match response {
            DriverResponse::Accept => self.finalize_accepted(order_id, driver_id, payload, driver_name).await,
            DriverResponse::Reject => self.process_rejection(order_id, driver_id, &payload).await,
        }
    }

    async fn finalize_accepted(
        &self,
        order_id: OrderId,
        accepting_driver: DriverId,
        payload: OrderPayload,
        driver_name: Option<&str>,
    ) -> AppResult<ResponseOutcome> {
        if !self.store.remove_order(order_id)? {
            log::info!(
                "⚠️ Driver {} lost the race for order {}: already resolved",
                accepting_driver,
                order_id
            );
            return Ok(ResponseOutcome::NotPending);
        }
        self.cancel_timeout(order_id);
        log::info!("🎉 Order {} accepted by driver {}", order_id, accepting_driver);

        self.notify_client(order_id, &payload, notice::client_driver_accepted(order_id, &payload, driver_name))
            .await;

        let others: Vec<DriverId> = self
            .directory
            .list_drivers()
            .into_iter()
            .filter(|&d| d != accepting_driver)
            .collect();
        self.send_transient_notice(&others, notice::order_taken_notice(order_id), self.settings.taken_notice_ttl)
            .await;

        Ok(ResponseOutcome::Accepted(payload))
    }

    async fn process_rejection(
        &self,
        order_id: OrderId,
        rejecting_driver: DriverId,
        payload: &OrderPayload,
    ) -> AppResult<ResponseOutcome> {
        let responses = self.store.get_responses(order_id)?;
        let rejected: BTreeSet<DriverId> = responses
            .iter()
            .filter(|(_, r)| **r == DriverResponse::Reject)
            .map(|(&d, _)| d)
            .collect();

        let drivers = self.directory.list_drivers();
        let rejected_known = drivers.iter().filter(|d| rejected.contains(d)).count();

        log::info!(
            "👎 Order {} rejected by driver {}: {}/{} drivers rejected",
            order_id,
            rejecting_driver,
            rejected_known,
            drivers.len()
        );

        if rejected_known < drivers.len() {
            log::info!(
                "⏳ Order {} stays pending, {} driver(s) can still accept",
                order_id,
                drivers.len() - rejected_known
            );
            return Ok(ResponseOutcome::StillPending);
        }

        if self.store.remove_order(order_id)? {
            self.cancel_timeout(order_id);
            log::info!("🚫 All {} drivers rejected order {}, cancelled", drivers.len(), order_id);
            self.notify_client(order_id, payload, notice::client_all_declined()).await;
        }
        Ok(ResponseOutcome::AllRejected)
    }

    // ── timeout ──────────────────────────────────────────────────────────────

    fn schedule_timeout(&self, order_id: OrderId) {
        let generation = self.timer_generation.fetch_add(1, Ordering::Relaxed);
        let engine = self.clone();
        let timeout = self.settings.order_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            engine.forget_timeout(order_id, generation);
            if let Err(e) = engine.expire_order(order_id).await {
                log::error!("💥 Auto-cancel of order {} failed: {}", order_id, e);
            }
        });

        let previous = self.timers().insert(order_id, TimeoutTask { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Cancels the order's timeout task if this process started one.
    fn cancel_timeout(&self, order_id: OrderId) {
        if let Some(task) = self.timers().remove(&order_id) {
            task.handle.abort();
            log::info!("⏰ Cancelled auto-cancel timer for order {}", order_id);
        }
    }

    /// Drops the finished task's entry unless a newer broadcast replaced it.
    fn forget_timeout(&self, order_id: OrderId, generation: u64) {
        let mut timers = self.timers();
        if timers.get(&order_id).is_some_and(|t| t.generation == generation) {
            timers.remove(&order_id);
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<OrderId, TimeoutTask>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels an order whose timer fired. A no-op returning `false` when the
    /// order was resolved in the meantime.
    pub async fn expire_order(&self, order_id: OrderId) -> AppResult<bool> {
        let Some(payload) = self.store.get_order(order_id)? else {
            log::info!("⏰ Order {} already processed before timeout", order_id);
            return Ok(false);
        };
        if !self.store.remove_order(order_id)? {
            log::info!("⏰ Order {} resolved while timing out", order_id);
            return Ok(false);
        }

        log::info!("⏰ Order {} auto-cancelled: no driver answered in time", order_id);
        self.notify_client(order_id, &payload, notice::client_timed_out()).await;

        let drivers = self.directory.list_drivers();
        self.send_transient_notice(&drivers, notice::order_timeout_notice(order_id), self.settings.timeout_notice_ttl)
            .await;
        Ok(true)
    }

    /// Whether a timeout task started by this engine is still waiting.
    pub fn has_timeout_scheduled(&self, order_id: OrderId) -> bool {
        self.timers().get(&order_id).is_some_and(|t| !t.handle.is_finished())
    }

    /// Aborts every timeout task of this process. Pending records stay in the
    /// store.
    pub fn cancel_all_timeouts(&self) {
        for (_, task) in self.timers().drain() {
            task.handle.abort();
        }
    }

    // ── notifications ────────────────────────────────────────────────────────

    async fn notify_client(&self, order_id: OrderId, payload: &OrderPayload, message: OutgoingMessage) {
        let Some(client_id) = payload.client_id() else {
            log::warn!("⚠️ Order {} has no client id, client not notified", order_id);
            return;
        };
        match self.channel.send(Recipient::Client(client_id), message).await {
            Ok(_) => log::info!("📱 Client {} notified about order {}", client_id, order_id),
            Err(e) => log::error!("❌ Failed to notify client {} about order {}: {}", client_id, order_id, e),
        }
    }

    /// Best-effort silent notice to each driver, deleted again after `ttl`.
    async fn send_transient_notice(&self, drivers: &[DriverId], message: OutgoingMessage, ttl: Duration) {
        for &driver_id in drivers {
            let recipient = Recipient::Driver(driver_id);
            match self.channel.send(recipient, message.clone()).await {
                Ok(message_id) => delete_after(Arc::clone(&self.channel), recipient, message_id, ttl),
                Err(e) => log::warn!("❌ Failed to send notice to driver {}: {}", driver_id, e),
            }
        }
    }

    // ── read accessors ───────────────────────────────────────────────────────

    pub fn is_pending(&self, order_id: OrderId) -> AppResult<bool> {
        Ok(self.store.get_order(order_id)?.is_some())
    }

    pub fn all_pending_order_ids(&self) -> AppResult<Vec<OrderId>> {
        self.store.list_order_ids()
    }
}
