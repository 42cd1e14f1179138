//! # Product Service
//!
//! The authority for the product catalogue: listings, moderation status,
//! stock, and ratings. Operations validate against local replicas and
//! emit; every state change is applied by the event handler, so a
//! redelivered event and a fresh one take the same code path.
//!
//! Stock is the one place cross-service consistency bites. `OrderCreated`
//! decrements under the store's write lock with a checked subtraction, so
//! two orders racing for the last unit cannot drive quantity negative;
//! the loser's order is sent back to the order authority for
//! cancellation.

pub mod handler;
pub mod service;

pub use service::ProductService;
