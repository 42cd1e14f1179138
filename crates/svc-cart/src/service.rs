//! Cart authority state and operations.

use shared_bus::{MarketEvent, Outbox};
use shared_types::entities::{
    Cart, CartLine, ProductId, ProductStatus, Role, UserId, MAX_CART_LINES,
};
use shared_types::{
    AccessToken, MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Per-line result of a checkout attempt.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub product_id: ProductId,
    pub result: Result<(), MarketError>,
}

/// The shopping cart authority.
pub struct CartService {
    pub(crate) carts: RwLock<HashMap<UserId, Cart>>,
    pub(crate) products: ProductReplicaStore,
    pub(crate) users: UserReplicaStore,
    pub(crate) verifier: TokenVerifier,
    pub(crate) outbox: Outbox,
}

impl CartService {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            carts: RwLock::new(HashMap::new()),
            products: ProductReplicaStore::new(),
            users: UserReplicaStore::new(),
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

    /// The caller's own cart.
    pub fn cart(&self, token: &AccessToken) -> Result<Cart, MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        self.cart_for(buyer.id)
            .ok_or_else(|| MarketError::NotFound("cart not found".into()))
    }

    #[must_use]
    pub fn cart_for(&self, user_id: UserId) -> Option<Cart> {
        self.read().get(&user_id).cloned()
    }

    /// Add `delta` to a line's quantity, creating the line on first add
    /// and dropping it when the quantity reaches zero.
    pub fn edit_line_quantity(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        delta: i64,
    ) -> Result<(), MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let product = self
            .products
            .get(product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        if product.status != ProductStatus::Approved {
            return Err(MarketError::Validation(
                "product is not available for purchase".into(),
            ));
        }

        let mut carts = self.write();
        let cart = carts
            .get_mut(&buyer.id)
            .ok_or_else(|| MarketError::NotFound("cart not found".into()))?;

        let current = cart.line(product_id).map_or(0i64, |l| l.quantity as i64);
        let next = current + delta;
        if next < 0 {
            return Err(MarketError::Validation(
                "quantity cannot go negative".into(),
            ));
        }
        if next as u64 > product.quantity {
            return Err(MarketError::Validation("insufficient stock".into()));
        }

        if next == 0 {
            let displaced = cart
                .line(product_id)
                .and_then(|l| l.coupon.clone());
            cart.lines.retain(|l| l.product_id != product_id);
            drop(carts);
            if let Some(coupon) = displaced {
                self.outbox.stage(MarketEvent::CouponAddedBack {
                    token: token.clone(),
                    coupon,
                });
            }
            return Ok(());
        }

        match cart.line_mut(product_id) {
            Some(line) => line.quantity = next as u64,
            None => {
                if cart.lines.len() >= MAX_CART_LINES {
                    return Err(MarketError::Validation(format!(
                        "cart is limited to {MAX_CART_LINES} lines"
                    )));
                }
                cart.lines.push(CartLine {
                    product_id,
                    quantity: next as u64,
                    ordered: false,
                    coupon: None,
                });
            }
        }
        Ok(())
    }

    /// Drop a line entirely, returning any applied coupon to the pool.
    pub fn remove_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let displaced = {
            let mut carts = self.write();
            let cart = carts
                .get_mut(&buyer.id)
                .ok_or_else(|| MarketError::NotFound("cart not found".into()))?;
            let coupon = cart.line(product_id).map(|l| l.coupon.clone());
            let Some(coupon) = coupon else {
                return Err(MarketError::NotFound("line not found".into()));
            };
            cart.lines.retain(|l| l.product_id != product_id);
            coupon
        };
        if let Some(coupon) = displaced {
            self.outbox.stage(MarketEvent::CouponAddedBack {
                token: token.clone(),
                coupon,
            });
        }
        Ok(())
    }

    /// Move a coupon from the pool onto a line. A coupon already on the
    /// line is displaced back to the pool, as exactly one event.
    pub fn apply_coupon(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        code: &str,
    ) -> Result<(), MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let product = self
            .products
            .get(product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        let coupon = self
            .users
            .get(buyer.id)
            .and_then(|u| u.coupon(code).cloned())
            .ok_or_else(|| MarketError::NotFound("coupon not found".into()))?;
        if !coupon.applies_to(product.id, product.seller_id) {
            return Err(MarketError::Validation(
                "coupon does not apply to this product".into(),
            ));
        }

        let displaced = {
            let mut carts = self.write();
            let cart = carts
                .get_mut(&buyer.id)
                .ok_or_else(|| MarketError::NotFound("cart not found".into()))?;
            let line = cart
                .line_mut(product_id)
                .ok_or_else(|| MarketError::NotFound("line not found".into()))?;
            line.coupon.replace(coupon.clone())
        };
        // Pool bookkeeping after the slot is settled.
        self.users.consume_coupon(buyer.id, code)?;
        info!(buyer = %buyer.id, code, product = %product_id, "coupon applied to line");
        if let Some(old) = displaced {
            self.outbox.stage(MarketEvent::CouponAddedBack {
                token: token.clone(),
                coupon: old,
            });
        }
        Ok(())
    }

    /// Take the coupon off a line and return it to the pool.
    pub fn remove_coupon(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let removed = {
            let mut carts = self.write();
            let cart = carts
                .get_mut(&buyer.id)
                .ok_or_else(|| MarketError::NotFound("cart not found".into()))?;
            let line = cart
                .line_mut(product_id)
                .ok_or_else(|| MarketError::NotFound("line not found".into()))?;
            line.coupon
                .take()
                .ok_or_else(|| MarketError::NotFound("no coupon on this line".into()))?
        };
        self.outbox.stage(MarketEvent::CouponAddedBack {
            token: token.clone(),
            coupon: removed,
        });
        Ok(())
    }

    /// Hand every unordered line to the order saga, independently.
    ///
    /// Lines that pass local validation are marked ordered, emitted as
    /// `PlaceOrder`, and pruned; lines that fail stay in the cart with
    /// their error reported. An empty cart is a validation error.
    pub fn checkout(&self, token: &AccessToken) -> Result<Vec<CheckoutOutcome>, MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let mut outcomes = Vec::new();
        let mut placed = Vec::new();
        {
            let mut carts = self.write();
            let cart = carts
                .get_mut(&buyer.id)
                .ok_or_else(|| MarketError::NotFound("cart not found".into()))?;
            if cart.lines.is_empty() {
                return Err(MarketError::Validation("cart is empty".into()));
            }
            for line in &mut cart.lines {
                if line.ordered {
                    continue;
                }
                match self.validate_line(line) {
                    Ok(()) => {
                        line.ordered = true;
                        placed.push(line.clone());
                        outcomes.push(CheckoutOutcome {
                            product_id: line.product_id,
                            result: Ok(()),
                        });
                    }
                    Err(err) => outcomes.push(CheckoutOutcome {
                        product_id: line.product_id,
                        result: Err(err),
                    }),
                }
            }
            cart.lines.retain(|l| !l.ordered);
        }
        for line in placed {
            info!(buyer = %buyer.id, product = %line.product_id, qty = line.quantity, "line sent to checkout");
            self.outbox.stage(MarketEvent::PlaceOrder {
                token: token.clone(),
                line,
            });
        }
        Ok(outcomes)
    }

    fn validate_line(&self, line: &CartLine) -> Result<(), MarketError> {
        let product = self
            .products
            .get(line.product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        if product.status != ProductStatus::Approved {
            return Err(MarketError::Validation(
                "product is not available for purchase".into(),
            ));
        }
        if product.quantity < line.quantity {
            return Err(MarketError::Validation("insufficient stock".into()));
        }
        if let Some(coupon) = &line.coupon {
            if !coupon.discount_in_range() {
                return Err(MarketError::Validation(
                    "discount percentage out of range".into(),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, Cart>> {
        self.carts.read().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, Cart>> {
        self.carts.write().unwrap_or_else(|p| p.into_inner())
    }
}
