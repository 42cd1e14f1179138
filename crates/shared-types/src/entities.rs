//! # Domain Entities
//!
//! Entities owned authoritatively by exactly one service and replicated
//! read-mostly elsewhere. Monetary amounts are integer cents; there is no
//! floating-point money anywhere in the system.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a user (customer, seller, or admin).
pub type UserId = Uuid;
/// Identifier for a product.
pub type ProductId = Uuid;
/// Identifier for an order.
pub type OrderId = Uuid;
/// Monetary amount in integer cents.
pub type Cents = u64;

/// Maximum number of distinct product lines a cart may hold.
pub const MAX_CART_LINES: usize = 10;

/// Inclusive bounds for coupon discount percentages.
pub const DISCOUNT_MIN: u8 = 10;
/// Upper inclusive bound for coupon discount percentages.
pub const DISCOUNT_MAX: u8 = 90;

/// Role of a user. Immutable after creation: no handler or patch touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
}

/// Moderation status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Awaiting moderation. Not orderable.
    Pending,
    /// Cleared by moderation.
    Approved,
    /// Rejected by moderation. Not orderable.
    Rejected,
}

/// Lifecycle status of an order. Transitions only move forward, except
/// `Cancelled` which triggers a compensating stock restock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// `Delivered` and `Cancelled` are terminal. Everything else moves
    /// forward only; `Cancelled` is reachable from any non-terminal state.
    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (Self::Delivered, _) | (Self::Cancelled, _) => false,
            (Self::Pending, Self::Shipped | Self::Delivered | Self::Cancelled) => true,
            (Self::Shipped, Self::Delivered | Self::Cancelled) => true,
            _ => false,
        }
    }
}

/// A discount coupon issued by a seller.
///
/// Not a standalone store: coupons live embedded in user coupon pools and
/// are fanned out by copy to every customer on creation. `seller_name` and
/// `product_name` are denormalized for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    /// Globally unique code among coupons in circulation.
    pub code: String,
    /// Discount in percent, always within `[DISCOUNT_MIN, DISCOUNT_MAX]`.
    pub discount_percentage: u8,
    /// Item-scoped coupons name a product; seller-wide coupons do not.
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub seller_id: UserId,
    pub seller_name: String,
}

impl Coupon {
    /// Whether the discount is within the accepted range.
    ///
    /// Validated at creation time AND again at consumption time as a
    /// defense against stale replicas.
    #[must_use]
    pub fn discount_in_range(&self) -> bool {
        (DISCOUNT_MIN..=DISCOUNT_MAX).contains(&self.discount_percentage)
    }

    /// Whether this coupon may be applied to the given product.
    ///
    /// An item-scoped coupon is invalid for any other product even when
    /// issued by the same seller; a seller-wide coupon applies to any of
    /// that seller's products.
    #[must_use]
    pub fn applies_to(&self, product_id: ProductId, seller_id: UserId) -> bool {
        if self.seller_id != seller_id {
            return false;
        }
        match self.product_id {
            Some(scoped) => scoped == product_id,
            None => true,
        }
    }
}

/// The denormalized user projection replicated into every service that has
/// to authorize event payloads locally. The authoritative user (with email,
/// address, and password hash) lives only in the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReplica {
    pub id: UserId,
    /// Unique display name.
    pub name: String,
    pub role: Role,
    /// Active session tokens, in encoded form.
    pub tokens: Vec<String>,
    /// Coupon pool: owned coupons for sellers, available coupons for customers.
    pub coupons: Vec<Coupon>,
}

impl UserReplica {
    /// Creates a replica with no sessions and an empty coupon pool.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            tokens: Vec::new(),
            coupons: Vec::new(),
        }
    }

    /// Whether the encoded token is an active session for this user.
    #[must_use]
    pub fn has_session(&self, encoded_token: &str) -> bool {
        self.tokens.iter().any(|t| t == encoded_token)
    }

    /// Looks up a coupon in the pool by code.
    #[must_use]
    pub fn coupon(&self, code: &str) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.code == code)
    }

    /// Adds a coupon to the pool. Idempotent by code.
    pub fn add_coupon(&mut self, coupon: Coupon) {
        if self.coupon(&coupon.code).is_none() {
            self.coupons.push(coupon);
        }
    }

    /// Removes and returns the coupon with the given code, if present.
    pub fn take_coupon(&mut self, code: &str) -> Option<Coupon> {
        let idx = self.coupons.iter().position(|c| c.code == code)?;
        Some(self.coupons.remove(idx))
    }
}

/// A product, owned authoritatively by the product service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique within a store.
    pub name: String,
    /// Unit price in cents.
    pub price: Cents,
    /// Available stock. Never negative by construction: decrements are
    /// checked under the store's write lock.
    pub quantity: u64,
    pub status: ProductStatus,
    /// Running average rating, 0.0..=5.0.
    pub rating: f64,
    pub total_ratings: u64,
    pub seller_id: UserId,
    /// Complaints filed against this product.
    pub complaints: Vec<String>,
}

impl Product {
    /// Creates a new product pending moderation.
    #[must_use]
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Cents,
        quantity: u64,
        seller_id: UserId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            quantity,
            status: ProductStatus::Pending,
            rating: 0.0,
            total_ratings: 0,
            seller_id,
            complaints: Vec::new(),
        }
    }

    /// Folds one new rating into the running average and bumps the count.
    pub fn apply_rating(&mut self, rating: u8) {
        let prior = self.total_ratings as f64;
        self.rating = (prior * self.rating + f64::from(rating)) / (prior + 1.0);
        self.total_ratings += 1;
    }
}

/// An order, owned authoritatively by the order service and replicated into
/// the payout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Placement time, unix milliseconds.
    pub date: u64,
    pub seller_id: UserId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u64,
    /// Final value in cents, after any coupon discount.
    pub total_value: Cents,
    pub status: OrderStatus,
}

/// One product line in a customer's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Set once the line has been handed to the order saga; ordered lines
    /// are pruned after a checkout attempt.
    pub ordered: bool,
    /// At most one coupon may be applied per line.
    pub coupon: Option<Coupon>,
}

/// A customer's shopping cart (1:1 with a customer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart for a customer.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            lines: Vec::new(),
        }
    }

    /// Finds the line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Mutable variant of [`Cart::line`].
    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

/// Allow-listed profile updates: `{name, email, address, password}`.
///
/// Unknown fields fail deserialization; any present-but-empty value rejects
/// the whole patch. The password travels only from the HTTP layer to the
/// authentication service; the replicated `UserEdited` event carries the
/// non-secret fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserPatch {
    /// Whether the patch changes anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.password.is_none()
    }

    /// Rejects patches with empty-string values or no fields.
    pub fn validate(&self) -> Result<(), crate::MarketError> {
        if self.is_empty() {
            return Err(crate::MarketError::Validation("empty update".into()));
        }
        for value in [&self.name, &self.email, &self.address, &self.password]
            .into_iter()
            .flatten()
        {
            if value.is_empty() {
                return Err(crate::MarketError::Validation(
                    "update values must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// The patch with the secret field stripped, for replication.
    #[must_use]
    pub fn without_password(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }
}

/// Allow-listed product updates: `{name, price, quantity, status}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl ProductPatch {
    /// Whether the patch changes anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.status.is_none()
    }

    /// Rejects patches with an empty name or no fields.
    pub fn validate(&self) -> Result<(), crate::MarketError> {
        if self.is_empty() {
            return Err(crate::MarketError::Validation("empty update".into()));
        }
        if self.name.as_deref() == Some("") {
            return Err(crate::MarketError::Validation(
                "update values must not be empty".into(),
            ));
        }
        if self.price == Some(0) {
            return Err(crate::MarketError::Validation(
                "price must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Applies the patch onto a product. Callers have already validated.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
    }
}

/// Minimal syntactic email validation: one `@`, non-empty local part, and a
/// dot somewhere in the domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
