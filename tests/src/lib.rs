//! # Marketplace Test Suite
//!
//! Cross-service choreography tests running every service against one
//! in-memory bus, the way the runtime wires them in production.
//!
//! ```text
//! tests/src/
//! ├── world.rs          # Running runtime plus converging fixtures
//! └── integration/      # Cross-service flows
//!     ├── lifecycle.rs  # Users, sessions, carts
//!     ├── catalogue.rs  # Listings and moderation
//!     ├── checkout.rs   # Cart → order → stock → payout saga
//!     └── coupons.rs    # Issuance, application, retraction
//! ```
//!
//! Run with `cargo test -p marketplace-tests`.

pub mod world;

mod integration {
    mod catalogue;
    mod checkout;
    mod coupons;
    mod lifecycle;
}
