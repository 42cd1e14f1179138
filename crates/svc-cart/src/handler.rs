//! Event handler for the cart service.
//!
//! Carts track the user lifecycle: a customer replica appearing creates
//! an empty cart, a removal destroys it. Coupon retraction and use must
//! also reach into line slots, since an applied coupon lives on the line
//! rather than in the pool.

use crate::service::CartService;
use async_trait::async_trait;
use shared_bus::{
    apply_product_event, apply_user_event, EventHandler, MarketEvent, Outbox, ReplicaEffect,
};
use shared_types::entities::{Cart, Role};
use shared_types::MarketError;
use tracing::debug;

#[async_trait]
impl EventHandler for CartService {
    fn service_name(&self) -> &'static str {
        "cart"
    }

    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    async fn handle_event(&self, event: &MarketEvent) -> Result<(), MarketError> {
        match apply_user_event(&self.users, &self.verifier, event)? {
            ReplicaEffect::UserInserted { id, role } => {
                if role == Role::Customer {
                    let mut carts = self.write();
                    carts.entry(id).or_insert_with(|| Cart::new(id));
                    debug!(user = %id, "cart created");
                }
                return Ok(());
            }
            ReplicaEffect::UserRemoved { id, .. } => {
                self.write().remove(&id);
                debug!(user = %id, "cart destroyed");
                return Ok(());
            }
            ReplicaEffect::CouponRetracted { code } => {
                let mut carts = self.write();
                for cart in carts.values_mut() {
                    for line in &mut cart.lines {
                        if line.coupon.as_ref().is_some_and(|c| c.code == code) {
                            line.coupon = None;
                        }
                    }
                }
                return Ok(());
            }
            ReplicaEffect::CouponConsumed { user, code } => {
                // A coupon spent elsewhere cannot stay applied here.
                let mut carts = self.write();
                if let Some(cart) = carts.get_mut(&user) {
                    for line in &mut cart.lines {
                        if line.coupon.as_ref().is_some_and(|c| c.code == code) {
                            line.coupon = None;
                        }
                    }
                }
                return Ok(());
            }
            ReplicaEffect::Applied => return Ok(()),
            ReplicaEffect::NotApplied => {}
            ReplicaEffect::ProductRemoved { .. } => {}
        }
        match apply_product_event(&self.products, &self.users, &self.verifier, event)? {
            ReplicaEffect::ProductRemoved { id } => {
                let mut carts = self.write();
                for cart in carts.values_mut() {
                    cart.lines.retain(|l| l.product_id != id);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
