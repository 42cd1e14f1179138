//! # Payout Service
//!
//! Accrues seller earnings from delivered orders. Keeps its own order
//! replica so the credit can be computed locally when the `Delivered`
//! status change arrives; each order credits its seller exactly once,
//! however many times the event is delivered.

pub mod handler;
pub mod service;

pub use service::PayoutService;
