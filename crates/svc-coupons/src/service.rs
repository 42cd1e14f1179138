//! Coupon authority operations.

use shared_bus::{MarketEvent, Outbox};
use shared_types::entities::{Coupon, ProductId, Role, DISCOUNT_MAX, DISCOUNT_MIN};
use shared_types::{
    AccessToken, MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore,
};
use tracing::info;

/// The coupon authority.
pub struct CouponService {
    pub(crate) users: UserReplicaStore,
    pub(crate) products: ProductReplicaStore,
    pub(crate) verifier: TokenVerifier,
    pub(crate) outbox: Outbox,
}

impl CouponService {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            users: UserReplicaStore::new(),
            products: ProductReplicaStore::new(),
            verifier,
            outbox: Outbox::new(),
        }
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    #[must_use]
    pub fn users(&self) -> &UserReplicaStore {
        &self.users
    }

    #[must_use]
    pub fn products(&self) -> &ProductReplicaStore {
        &self.products
    }

    /// Issue a coupon. `product_id` scopes it to one of the caller's
    /// products; absent, it applies to everything the caller sells.
    pub fn create_coupon(
        &self,
        token: &AccessToken,
        code: &str,
        discount_percentage: u8,
        product_id: Option<ProductId>,
    ) -> Result<(), MarketError> {
        let seller = self
            .users
            .authorize(&self.verifier, token, Some(Role::Seller))?;
        if code.trim().is_empty() {
            return Err(MarketError::Validation("code must not be empty".into()));
        }
        if !(DISCOUNT_MIN..=DISCOUNT_MAX).contains(&discount_percentage) {
            return Err(MarketError::Validation(format!(
                "discount must be within {DISCOUNT_MIN}..={DISCOUNT_MAX} percent"
            )));
        }
        if self.users.coupon_in_circulation(code) {
            return Err(MarketError::Validation("code already in circulation".into()));
        }
        let product_name = match product_id {
            Some(id) => {
                let product = self
                    .products
                    .get(id)
                    .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
                if product.seller_id != seller.id {
                    return Err(MarketError::Unauthorized(
                        "product belongs to another seller".into(),
                    ));
                }
                Some(product.name)
            }
            None => None,
        };
        let coupon = Coupon {
            code: code.to_string(),
            discount_percentage,
            product_id,
            product_name,
            seller_id: seller.id,
            seller_name: seller.name.clone(),
        };
        info!(seller = %seller.id, code, discount_percentage, "coupon issued");
        self.outbox.stage(MarketEvent::CouponCreated {
            token: token.clone(),
            coupon,
        });
        Ok(())
    }

    /// Retract one of the caller's own coupons from circulation.
    pub fn delete_coupon(&self, token: &AccessToken, code: &str) -> Result<(), MarketError> {
        let seller = self
            .users
            .authorize(&self.verifier, token, Some(Role::Seller))?;
        let coupon = self
            .users
            .find_coupon(code)
            .ok_or_else(|| MarketError::NotFound("coupon not found".into()))?;
        if coupon.seller_id != seller.id {
            return Err(MarketError::Unauthorized(
                "coupon belongs to another seller".into(),
            ));
        }
        info!(seller = %seller.id, code, "coupon retracted");
        self.outbox.stage(MarketEvent::CouponDeleted {
            token: token.clone(),
            coupon,
        });
        Ok(())
    }

    /// The coupons currently in the caller's pool.
    pub fn coupons_for(&self, token: &AccessToken) -> Result<Vec<Coupon>, MarketError> {
        let principal = self.users.authorize(&self.verifier, token, None)?;
        Ok(self
            .users
            .get(principal.id)
            .map(|u| u.coupons)
            .unwrap_or_default())
    }
}
