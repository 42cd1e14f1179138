//! # Event Bus
//!
//! In-memory bus built on `tokio::sync::broadcast` with per-subscription
//! acknowledgment and redelivery. Suitable for single-node operation;
//! a distributed deployment would back the same traits with a real broker.

use crate::events::{EventFilter, MarketEvent};
use crate::{DEFAULT_CHANNEL_CAPACITY, MAX_DELIVERY_ATTEMPTS};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::{debug, error, warn};

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The event bus was closed.
    #[error("event bus closed")]
    Closed,
}

/// Trait for publishing events to the bus.
///
/// Fire-and-forget from the publisher's perspective; services that must
/// not lose derived events stage them in an [`crate::Outbox`] instead of
/// publishing inline.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns the number of live subscribers.
    async fn publish(&self, event: MarketEvent) -> Result<usize, BusError>;

    /// Total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<MarketEvent>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    ///
    /// Every matching event is delivered to every subscription (fan-out).
    /// The returned handle owns a private redelivery queue for unacked
    /// deliveries.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "new subscription created");
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
            redelivery: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// An auto-acknowledging stream of matching events, for observers that
    /// do not participate in the at-least-once contract (tests, metrics).
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream {
            subscription: self.subscribe(filter),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: MarketEvent) -> Result<usize, BusError> {
        let kind = event.kind();
        let topic = event.topic();

        // Counter reflects attempts, not deliveries.
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(kind, ?topic, receivers = receiver_count, "event published");
                Ok(receiver_count)
            }
            Err(_) => {
                warn!(kind, ?topic, "event dropped (no receivers)");
                Ok(0)
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

type RedeliveryQueue = Arc<Mutex<VecDeque<(MarketEvent, u32)>>>;

/// A subscription handle for receiving events with manual acknowledgment.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<MarketEvent>,

    /// Filter for this subscription.
    filter: EventFilter,

    /// Unacked deliveries awaiting another attempt. Served before new
    /// events so redeliveries cannot starve behind a busy topic.
    redelivery: RedeliveryQueue,
}

impl Subscription {
    /// Receive the next matching delivery.
    ///
    /// Returns `None` once the bus is dropped and no redeliveries remain.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.pop_redelivery() {
                return Some(delivery);
            }
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    return Some(Delivery::new(event, 1, Arc::clone(&self.redelivery)));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return self.pop_redelivery();
                }
            }
        }
    }

    /// Try to receive the next matching delivery without blocking.
    pub fn try_recv(&mut self) -> Result<Option<Delivery>, BusError> {
        if let Some(delivery) = self.pop_redelivery() {
            return Ok(Some(delivery));
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => {
                    return Ok(Some(Delivery::new(event, 1, Arc::clone(&self.redelivery))));
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            }
        }
    }

    /// The filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Pending redeliveries on this subscription.
    #[must_use]
    pub fn pending_redeliveries(&self) -> usize {
        self.redelivery.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn pop_redelivery(&self) -> Option<Delivery> {
        let mut queue = self.redelivery.lock().unwrap_or_else(|p| p.into_inner());
        let (event, attempt) = queue.pop_front()?;
        Some(Delivery::new(event, attempt, Arc::clone(&self.redelivery)))
    }
}

/// One attempt to deliver an event to one subscription.
///
/// Call [`Delivery::ack`] after the local apply has completed. Dropping a
/// delivery unacked (or calling [`Delivery::nack`]) requeues the event for
/// redelivery until the attempt budget is exhausted, after which it is
/// dead-lettered: logged at error level and dropped.
pub struct Delivery {
    event: Option<MarketEvent>,
    attempt: u32,
    redelivery: RedeliveryQueue,
}

impl Delivery {
    fn new(event: MarketEvent, attempt: u32, redelivery: RedeliveryQueue) -> Self {
        Self {
            event: Some(event),
            attempt,
            redelivery,
        }
    }

    /// The delivered event.
    #[must_use]
    pub fn event(&self) -> &MarketEvent {
        self.event
            .as_ref()
            .expect("delivery accessed after settlement")
    }

    /// Which delivery attempt this is, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledge: the local apply completed (or the event was judged
    /// permanently unprocessable and dropped on purpose).
    pub fn ack(mut self) {
        self.event = None;
    }

    /// Negative-acknowledge: request redelivery.
    pub fn nack(self) {
        // Dropping unacked requeues; nack just makes the intent explicit.
        drop(self);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let Some(event) = self.event.take() else {
            return;
        };
        if self.attempt >= MAX_DELIVERY_ATTEMPTS {
            error!(
                kind = event.kind(),
                attempts = self.attempt,
                "event dead-lettered after exhausting delivery attempts"
            );
            return;
        }
        let mut queue = self.redelivery.lock().unwrap_or_else(|p| p.into_inner());
        queue.push_back((event, self.attempt + 1));
    }
}

/// A stream wrapper over a subscription that acknowledges every event on
/// receipt. Implements `tokio_stream::Stream` for use with combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl Stream for EventStream {
    type Item = MarketEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(delivery)) => {
                let event = delivery.event().clone();
                delivery.ack();
                Poll::Ready(Some(event))
            }
            Ok(None) => {
                // No event ready; re-register for wakeup.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(BusError::Closed) => Poll::Ready(None),
        }
    }
}
