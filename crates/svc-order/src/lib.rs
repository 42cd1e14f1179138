//! # Order Service
//!
//! The authority for orders. Placement is a choreographed saga: a
//! `PlaceOrder` request prices the line against the local product
//! replica, consumes any applied coupon, and emits `CouponUsed` plus
//! `OrderCreated`; the product service answers with a stock decrement or
//! bounces the order back as a cancellation.
//!
//! Status changes are forward-only. `Cancelled` fans out as its own
//! `OrderCancelled` event so stock and coupons can be returned.

pub mod handler;
pub mod saga;
pub mod service;

pub use service::OrderService;
