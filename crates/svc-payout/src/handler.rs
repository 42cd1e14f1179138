//! Event handler for the payout service.

use crate::service::PayoutService;
use async_trait::async_trait;
use shared_bus::{
    apply_product_event, apply_user_event, EventHandler, MarketEvent, Outbox, ReplicaEffect,
};
use shared_types::entities::OrderStatus;
use shared_types::MarketError;

#[async_trait]
impl EventHandler for PayoutService {
    fn service_name(&self) -> &'static str {
        "payout"
    }

    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    async fn handle_event(&self, event: &MarketEvent) -> Result<(), MarketError> {
        if apply_user_event(&self.users, &self.verifier, event)? != ReplicaEffect::NotApplied {
            return Ok(());
        }
        if apply_product_event(&self.products, &self.users, &self.verifier, event)?
            != ReplicaEffect::NotApplied
        {
            return Ok(());
        }
        match event {
            MarketEvent::OrderCreated { token, order } => {
                self.users.authorize(&self.verifier, token, None)?;
                let mut orders = self.orders.write().unwrap_or_else(|p| p.into_inner());
                orders.entry(order.id).or_insert_with(|| order.clone());
                Ok(())
            }
            MarketEvent::OrderEdited {
                token,
                order_id,
                status,
            } => {
                self.users.authorize(&self.verifier, token, None)?;
                let delivered = {
                    let mut orders = self.orders.write().unwrap_or_else(|p| p.into_inner());
                    let order = orders
                        .get_mut(order_id)
                        .ok_or_else(|| MarketError::NotFound("order not found".into()))?;
                    if order.status != *status && order.status.can_transition_to(*status) {
                        order.status = *status;
                    }
                    (*status == OrderStatus::Delivered).then(|| order.clone())
                };
                if let Some(order) = delivered {
                    self.credit(&order);
                }
                Ok(())
            }
            MarketEvent::OrderCancelled { token, order } => {
                self.users.authorize(&self.verifier, token, None)?;
                let mut orders = self.orders.write().unwrap_or_else(|p| p.into_inner());
                if let Some(replica) = orders.get_mut(&order.id) {
                    replica.status = OrderStatus::Cancelled;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
