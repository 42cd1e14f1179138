//! # Cart Service
//!
//! The authority for shopping carts, one per customer, created and
//! destroyed by user lifecycle events. A cart holds up to ten lines;
//! each line may carry at most one coupon, moved out of the customer's
//! pool when applied. Checkout hands each line to the order saga
//! independently and reports per-line results, so one bad line never
//! blocks the rest.

pub mod handler;
pub mod service;

pub use service::{CartService, CheckoutOutcome};
