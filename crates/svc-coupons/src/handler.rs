//! Event handler for the coupon service. Everything it consumes is
//! covered by the shared projections, including the fan-out of its own
//! `CouponCreated` events on self-delivery.

use crate::service::CouponService;
use async_trait::async_trait;
use shared_bus::{
    apply_product_event, apply_user_event, EventHandler, MarketEvent, Outbox, ReplicaEffect,
};
use shared_types::MarketError;

#[async_trait]
impl EventHandler for CouponService {
    fn service_name(&self) -> &'static str {
        "coupons"
    }

    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    async fn handle_event(&self, event: &MarketEvent) -> Result<(), MarketError> {
        if apply_user_event(&self.users, &self.verifier, event)? != ReplicaEffect::NotApplied {
            return Ok(());
        }
        apply_product_event(&self.products, &self.users, &self.verifier, event)?;
        Ok(())
    }
}
