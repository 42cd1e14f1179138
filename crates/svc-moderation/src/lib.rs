//! # Moderation Service
//!
//! Screens product names against a deny list. Purely reactive: it holds
//! no replicas, consumes `ModerateProduct` requests, and answers with a
//! `ProductModerated` verdict. Every product goes through moderation on
//! creation and again whenever it is renamed.

pub mod handler;
pub mod moderate;

pub use handler::ModerationHandler;
pub use moderate::moderate_name;
