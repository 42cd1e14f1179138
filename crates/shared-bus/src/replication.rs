//! # Shared Replica Projection
//!
//! Every service projects the same user-topic and product-topic events
//! into its local replica stores the same way. These appliers hold that
//! common projection in one place; per-service handlers call them first
//! and then act on the returned [`ReplicaEffect`] for anything extra
//! (the cart service creates a cart when a customer replica appears, and
//! so on).
//!
//! Authorization is event-carried: consumers verify the embedded token's
//! signature and check it against the session list in their own user
//! replica. Role and ownership rules are enforced where the event
//! originates; a consumer re-checks them only when the event can only
//! ever come from one role.

use crate::events::MarketEvent;
use shared_types::entities::{ProductId, Role, UserId};
use shared_types::{MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore};

/// What a shared applier did with an event, so the caller can hook
/// service-specific behavior onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaEffect {
    /// The event is not projected by this applier.
    NotApplied,

    /// The event was projected; nothing further to hook.
    Applied,

    /// A user replica was inserted.
    UserInserted { id: UserId, role: Role },

    /// A user replica was removed.
    UserRemoved { id: UserId, role: Role },

    /// A coupon code was retracted from every pool.
    CouponRetracted { code: String },

    /// A product replica was removed.
    ProductRemoved { id: ProductId },

    /// One user's pool no longer holds the coupon code.
    CouponConsumed { user: UserId, code: String },
}

/// Project a user-topic event into a user replica store.
///
/// Returns [`ReplicaEffect::NotApplied`] for events outside the shared
/// projection. A `NotFound` from a missing replica is transient: the
/// creating event may simply not have been applied yet, and redelivery
/// will converge.
pub fn apply_user_event(
    users: &UserReplicaStore,
    verifier: &TokenVerifier,
    event: &MarketEvent,
) -> Result<ReplicaEffect, MarketError> {
    match event {
        MarketEvent::UserAdded { user } => {
            users.insert(user.clone());
            Ok(ReplicaEffect::UserInserted {
                id: user.id,
                role: user.role,
            })
        }
        MarketEvent::AdminAdded { token, user } => {
            users.authorize(verifier, token, Some(Role::Admin))?;
            if user.role != Role::Admin {
                return Err(MarketError::Validation(
                    "admin creation event carried a non-admin user".into(),
                ));
            }
            users.insert(user.clone());
            Ok(ReplicaEffect::UserInserted {
                id: user.id,
                role: user.role,
            })
        }
        MarketEvent::UserRemoved { token } => {
            let principal = users.authorize(verifier, token, None)?;
            users.remove(principal.id);
            Ok(ReplicaEffect::UserRemoved {
                id: principal.id,
                role: principal.role,
            })
        }
        MarketEvent::AdminRemovedUser { token, name } => {
            users.authorize(verifier, token, Some(Role::Admin))?;
            let target = users
                .by_name(name)
                .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
            users.remove(target.id);
            Ok(ReplicaEffect::UserRemoved {
                id: target.id,
                role: target.role,
            })
        }
        MarketEvent::UserEdited { token, patch } => {
            let principal = users.authorize(verifier, token, None)?;
            users.apply_patch(principal.id, patch)?;
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::UserLoggedIn { name, token } => {
            // The session being recorded is the token itself, so only the
            // signature can be checked here.
            verifier.verify(token)?;
            users.record_login(name, &token.encode())?;
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::UserLoggedOut { token } => {
            let principal = verifier.verify(token)?;
            users.record_logout(principal, &token.encode())?;
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::CouponCreated { token, coupon } => {
            let seller = users.authorize(verifier, token, Some(Role::Seller))?;
            if seller.id != coupon.seller_id {
                return Err(MarketError::Unauthorized(
                    "coupon names a different seller".into(),
                ));
            }
            if !coupon.discount_in_range() {
                return Err(MarketError::Validation(
                    "discount percentage out of range".into(),
                ));
            }
            users.fan_out_coupon(coupon);
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::CouponDeleted { token, coupon } => {
            let seller = users.authorize(verifier, token, Some(Role::Seller))?;
            if seller.id != coupon.seller_id {
                return Err(MarketError::Unauthorized(
                    "coupon belongs to another seller".into(),
                ));
            }
            users.retract_coupon(&coupon.code);
            Ok(ReplicaEffect::CouponRetracted {
                code: coupon.code.clone(),
            })
        }
        MarketEvent::CouponUsed { token, code } => {
            let principal = users.authorize(verifier, token, None)?;
            users.prune_coupon(principal.id, code)?;
            Ok(ReplicaEffect::CouponConsumed {
                user: principal.id,
                code: code.clone(),
            })
        }
        MarketEvent::CouponAddedBack { token, coupon } => {
            let principal = users.authorize(verifier, token, Some(Role::Customer))?;
            users.return_coupon(principal.id, coupon.clone())?;
            Ok(ReplicaEffect::Applied)
        }
        _ => Ok(ReplicaEffect::NotApplied),
    }
}

/// Project a product-topic event into a product replica store.
///
/// `ProductEdited` only verifies authenticity, not the seller role: the
/// product authority also derives quantity edits from order events, and
/// those carry the buyer's token.
pub fn apply_product_event(
    products: &ProductReplicaStore,
    users: &UserReplicaStore,
    verifier: &TokenVerifier,
    event: &MarketEvent,
) -> Result<ReplicaEffect, MarketError> {
    match event {
        MarketEvent::ProductAdded { token, product } => {
            let seller = users.authorize(verifier, token, Some(Role::Seller))?;
            if seller.id != product.seller_id {
                return Err(MarketError::Unauthorized(
                    "product names a different seller".into(),
                ));
            }
            products.insert(product.clone());
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::ProductRemoved { token, product_id } => {
            let seller = users.authorize(verifier, token, Some(Role::Seller))?;
            products.remove(*product_id, seller.id)?;
            Ok(ReplicaEffect::ProductRemoved { id: *product_id })
        }
        MarketEvent::ProductEdited {
            token,
            product_id,
            patch,
        } => {
            users.authorize(verifier, token, None)?;
            products.apply_patch(*product_id, patch)?;
            Ok(ReplicaEffect::Applied)
        }
        MarketEvent::ProductRated {
            token,
            product_id,
            rating,
        } => {
            users.authorize(verifier, token, Some(Role::Customer))?;
            let product = products
                .get(*product_id)
                .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
            if product.status != shared_types::entities::ProductStatus::Approved {
                return Err(MarketError::Validation(
                    "only approved products can be rated".into(),
                ));
            }
            products.apply_rating(*product_id, *rating)?;
            Ok(ReplicaEffect::Applied)
        }
        _ => Ok(ReplicaEffect::NotApplied),
    }
}
