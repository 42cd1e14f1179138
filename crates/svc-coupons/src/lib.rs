//! # Coupon Service
//!
//! The authority for coupon issuance and retraction. A coupon is either
//! seller-wide or scoped to a single product of that seller; its
//! discount must sit within the accepted band. Creation only validates
//! and emits: the fan-out into the seller's and every customer's pool
//! happens when `CouponCreated` is applied, in this service and every
//! other one, via the shared projection.

pub mod handler;
pub mod service;

pub use service::CouponService;
