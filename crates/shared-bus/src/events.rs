//! # Marketplace Events
//!
//! The closed set of domain events that flow through the shared bus. The
//! wire form is the `{ "type": ..., "data": ... }` envelope; in process the
//! enum gives every dispatcher an exhaustive match with compile-time
//! coverage checking.
//!
//! Where an effect requires authorization, the payload embeds the caller's
//! signed [`AccessToken`] so consumers can re-derive the acting principal
//! against their local replica without calling the authority service.

use serde::{Deserialize, Serialize};
use shared_types::entities::{
    CartLine, Coupon, Order, OrderId, OrderStatus, Product, ProductId, ProductPatch,
    ProductStatus, UserPatch, UserReplica,
};
use shared_types::AccessToken;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MarketEvent {
    // =========================================================================
    // USER TOPIC (authority: svc-authentication)
    // =========================================================================
    /// A user signed up. Broadcast so every service can seed its replica.
    UserAdded { user: UserReplica },

    /// An admin created another admin account.
    AdminAdded { token: AccessToken, user: UserReplica },

    /// A user deleted their own account.
    UserRemoved { token: AccessToken },

    /// An admin removed the named user.
    AdminRemovedUser { token: AccessToken, name: String },

    /// Allow-listed profile patch (`{name, email, address, password}`).
    /// The replicated patch never carries the password.
    UserEdited { token: AccessToken, patch: UserPatch },

    /// A session was opened. Keyed by name: the token itself is the new
    /// session and cannot authorize its own registration.
    UserLoggedIn { name: String, token: AccessToken },

    /// A session was closed.
    UserLoggedOut { token: AccessToken },

    // =========================================================================
    // PRODUCT TOPIC (authority: svc-product)
    // =========================================================================
    /// A seller listed a new product (status pending until moderated).
    ProductAdded { token: AccessToken, product: Product },

    /// A seller withdrew a product.
    ProductRemoved {
        token: AccessToken,
        product_id: ProductId,
    },

    /// Allow-listed field patch (`{name, price, quantity, status}`). Also
    /// re-emitted by the product authority after stock changes and
    /// moderation verdicts.
    ProductEdited {
        token: AccessToken,
        product_id: ProductId,
        patch: ProductPatch,
    },

    /// A customer rated a product; every replica folds the same rating
    /// into its running average.
    ProductRated {
        token: AccessToken,
        product_id: ProductId,
        rating: u8,
    },

    /// Request to moderate a (new or renamed) product name.
    ModerateProduct {
        token: AccessToken,
        product_id: ProductId,
        name: String,
        status: ProductStatus,
    },

    /// Moderation verdict, consumed by the product authority.
    ProductModerated {
        token: AccessToken,
        product_id: ProductId,
        status: ProductStatus,
    },

    // =========================================================================
    // ORDER TOPIC (authority: svc-order)
    // =========================================================================
    /// Saga entry point: a checkout line handed to the order service.
    PlaceOrder { token: AccessToken, line: CartLine },

    /// An order was created. The product service reacts with a stock
    /// decrement; the payout service seeds its replica.
    OrderCreated { token: AccessToken, order: Order },

    /// A seller changed an order's status.
    OrderEdited {
        token: AccessToken,
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Compensation: the order was cancelled and its quantity must be
    /// restocked.
    OrderCancelled { token: AccessToken, order: Order },

    // =========================================================================
    // COUPON TOPIC (authority: svc-coupons)
    // =========================================================================
    /// A seller issued a coupon; every replica-holding service copies it
    /// into the seller's and all customers' pools.
    CouponCreated { token: AccessToken, coupon: Coupon },

    /// A seller withdrew a coupon; retracted from every pool.
    CouponDeleted { token: AccessToken, coupon: Coupon },

    /// A customer consumed a coupon during order placement.
    CouponUsed { token: AccessToken, code: String },

    /// A displaced or released coupon returned to the customer's pool.
    CouponAddedBack { token: AccessToken, coupon: Coupon },
}

impl MarketEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserAdded { .. } => "UserAdded",
            Self::AdminAdded { .. } => "AdminAdded",
            Self::UserRemoved { .. } => "UserRemoved",
            Self::AdminRemovedUser { .. } => "AdminRemovedUser",
            Self::UserEdited { .. } => "UserEdited",
            Self::UserLoggedIn { .. } => "UserLoggedIn",
            Self::UserLoggedOut { .. } => "UserLoggedOut",
            Self::ProductAdded { .. } => "ProductAdded",
            Self::ProductRemoved { .. } => "ProductRemoved",
            Self::ProductEdited { .. } => "ProductEdited",
            Self::ProductRated { .. } => "ProductRated",
            Self::ModerateProduct { .. } => "ModerateProduct",
            Self::ProductModerated { .. } => "ProductModerated",
            Self::PlaceOrder { .. } => "PlaceOrder",
            Self::OrderCreated { .. } => "OrderCreated",
            Self::OrderEdited { .. } => "OrderEdited",
            Self::OrderCancelled { .. } => "OrderCancelled",
            Self::CouponCreated { .. } => "CouponCreated",
            Self::CouponDeleted { .. } => "CouponDeleted",
            Self::CouponUsed { .. } => "CouponUsed",
            Self::CouponAddedBack { .. } => "CouponAddedBack",
        }
    }

    /// The topic (one queue per entity family) this event travels on.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::UserAdded { .. }
            | Self::AdminAdded { .. }
            | Self::UserRemoved { .. }
            | Self::AdminRemovedUser { .. }
            | Self::UserEdited { .. }
            | Self::UserLoggedIn { .. }
            | Self::UserLoggedOut { .. } => EventTopic::User,
            Self::ProductAdded { .. }
            | Self::ProductRemoved { .. }
            | Self::ProductEdited { .. }
            | Self::ProductRated { .. }
            | Self::ModerateProduct { .. }
            | Self::ProductModerated { .. } => EventTopic::Product,
            Self::PlaceOrder { .. }
            | Self::OrderCreated { .. }
            | Self::OrderEdited { .. }
            | Self::OrderCancelled { .. } => EventTopic::Order,
            Self::CouponCreated { .. }
            | Self::CouponDeleted { .. }
            | Self::CouponUsed { .. }
            | Self::CouponAddedBack { .. } => EventTopic::Coupon,
        }
    }
}

/// Event topics for subscription filtering. One topic per entity family,
/// matching the one-queue-per-entity bus topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    User,
    Product,
    Order,
    Coupon,
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &MarketEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}
