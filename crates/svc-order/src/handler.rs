//! Event handler for the order service.

use crate::service::OrderService;
use async_trait::async_trait;
use shared_bus::{
    apply_product_event, apply_user_event, EventHandler, MarketEvent, Outbox, ReplicaEffect,
};
use shared_types::entities::{Order, OrderId, OrderStatus};
use shared_types::{AccessToken, MarketError};
use tracing::info;

#[async_trait]
impl EventHandler for OrderService {
    fn service_name(&self) -> &'static str {
        "order"
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
            MarketEvent::PlaceOrder { token, line } => self.place_order(token, line),
            MarketEvent::OrderCreated { token, order } => {
                // Self-delivery of an order this authority just created.
                self.users.authorize(&self.verifier, token, None)?;
                let mut orders = self.write();
                orders.entry(order.id).or_insert_with(|| order.clone());
                Ok(())
            }
            MarketEvent::OrderEdited {
                token,
                order_id,
                status,
            } => self.apply_order_edited(token, *order_id, *status),
            _ => Ok(()),
        }
    }
}

impl OrderService {
    /// Apply a status change. Same-status redeliveries are no-ops; a
    /// transition to `Cancelled` fans out so stock and coupons return.
    fn apply_order_edited(
        &self,
        token: &AccessToken,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), MarketError> {
        self.users.authorize(&self.verifier, token, None)?;
        let cancelled = {
            let mut orders = self.write();
            let order = orders
                .get_mut(&order_id)
                .ok_or_else(|| MarketError::NotFound("order not found".into()))?;
            if order.status == status {
                return Ok(());
            }
            if !order.status.can_transition_to(status) {
                return Err(MarketError::Validation(format!(
                    "cannot move order from {:?} to {status:?}",
                    order.status
                )));
            }
            order.status = status;
            info!(order = %order_id, ?status, "order status changed");
            (status == OrderStatus::Cancelled).then(|| order.clone())
        };
        if let Some(order) = cancelled {
            self.stage_cancellation(token, order);
        }
        Ok(())
    }

    fn stage_cancellation(&self, token: &AccessToken, order: Order) {
        info!(order = %order.id, "order cancelled, fanning out");
        self.outbox.stage(MarketEvent::OrderCancelled {
            token: token.clone(),
            order,
        });
    }
}
