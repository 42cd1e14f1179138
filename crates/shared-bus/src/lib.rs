//! # Shared Bus - Event Bus for Inter-Service Choreography
//!
//! All inter-service communication goes through this bus; services never
//! call each other directly. Each domain event is broadcast on one of four
//! topics (`User`, `Product`, `Order`, `Coupon`) and every interested
//! service applies it to its own replica.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Service A   │    publish()       │  Service B   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe() + ack()
//! ```
//!
//! ## Delivery contract
//!
//! - **Fan-out**: every subscription whose filter matches receives the
//!   event; there are no competing consumers.
//! - **At-least-once**: a [`Delivery`] must be acknowledged after the local
//!   apply; an unacked or nacked delivery is requeued on that subscription
//!   and served again before new events, up to [`MAX_DELIVERY_ATTEMPTS`],
//!   then dead-lettered (logged and dropped).
//! - **Outbox**: derived events are staged in an [`Outbox`] alongside the
//!   local mutation and drained afterwards, so a consistency-critical side
//!   effect is never lost to a fire-and-forget publish.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod events;
pub mod handler;
pub mod outbox;
pub mod replication;

// Re-export main types
pub use bus::{BusError, Delivery, EventPublisher, EventStream, InMemoryEventBus, Subscription};
pub use events::{EventFilter, EventTopic, MarketEvent};
pub use handler::{run_event_loop, EventHandler};
pub use outbox::Outbox;
pub use replication::{apply_product_event, apply_user_event, ReplicaEffect};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Deliveries per event per subscription before dead-lettering.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;
