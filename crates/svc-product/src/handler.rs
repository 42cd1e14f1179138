//! Event handler for the product service.
//!
//! Order events drive the stock side of the order saga here:
//!
//! ```text
//! OrderCreated ──ok──→ checked decrement ──→ ProductEdited { quantity }
//!       │
//!       └─insufficient─→ OrderEdited { status: Cancelled }
//!
//! OrderCancelled ──(was decremented)──→ restock ──→ ProductEdited { quantity }
//! ```
//!
//! Decrement and restock are keyed by order id, so redeliveries and the
//! self-delivery of derived edits converge instead of double-applying.

use crate::service::ProductService;
use async_trait::async_trait;
use shared_bus::{
    apply_product_event, apply_user_event, EventHandler, MarketEvent, Outbox, ReplicaEffect,
};
use shared_types::entities::{Order, OrderStatus, ProductPatch};
use shared_types::{AccessToken, MarketError};
use tracing::{info, warn};

#[async_trait]
impl EventHandler for ProductService {
    fn service_name(&self) -> &'static str {
        "product"
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
            MarketEvent::ProductModerated {
                token,
                product_id,
                status,
            } => {
                self.users.authorize(&self.verifier, token, None)?;
                self.outbox.stage(MarketEvent::ProductEdited {
                    token: token.clone(),
                    product_id: *product_id,
                    patch: ProductPatch {
                        status: Some(*status),
                        ..ProductPatch::default()
                    },
                });
                Ok(())
            }
            MarketEvent::OrderCreated { token, order } => self.apply_order_created(token, order),
            MarketEvent::OrderCancelled { token, order } => {
                self.apply_order_cancelled(token, order)
            }
            _ => Ok(()),
        }
    }
}

impl ProductService {
    /// Decrement stock for a freshly created order, exactly once per
    /// order id. Insufficient stock bounces the order back for
    /// cancellation instead of letting quantity go negative.
    fn apply_order_created(&self, token: &AccessToken, order: &Order) -> Result<(), MarketError> {
        self.users.authorize(&self.verifier, token, None)?;
        {
            let applied = self.applied_orders.lock().unwrap_or_else(|p| p.into_inner());
            let rejected = self
                .rejected_orders
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            if applied.contains(&order.id) || rejected.contains(&order.id) {
                return Ok(());
            }
        }

        let decremented = self.products.with_product_mut(order.product_id, |product| {
            if product.quantity < order.quantity {
                return Ok(None);
            }
            product.quantity -= order.quantity;
            Ok(Some(product.quantity))
        })?;

        match decremented {
            Some(remaining) => {
                self.applied_orders
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(order.id);
                info!(order = %order.id, product = %order.product_id, remaining, "stock reserved");
                self.outbox.stage(MarketEvent::ProductEdited {
                    token: token.clone(),
                    product_id: order.product_id,
                    patch: ProductPatch {
                        quantity: Some(remaining),
                        ..ProductPatch::default()
                    },
                });
            }
            None => {
                self.rejected_orders
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(order.id);
                warn!(order = %order.id, product = %order.product_id, "insufficient stock, bouncing order");
                self.outbox.stage(MarketEvent::OrderEdited {
                    token: token.clone(),
                    order_id: order.id,
                    status: OrderStatus::Cancelled,
                });
            }
        }
        Ok(())
    }

    /// Return stock for a cancelled order, but only if this order ever
    /// took stock in the first place, and at most once.
    fn apply_order_cancelled(&self, token: &AccessToken, order: &Order) -> Result<(), MarketError> {
        self.users.authorize(&self.verifier, token, None)?;
        {
            let applied = self.applied_orders.lock().unwrap_or_else(|p| p.into_inner());
            let restocked = self
                .restocked_orders
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            if !applied.contains(&order.id) || restocked.contains(&order.id) {
                return Ok(());
            }
        }

        let restocked = self.products.with_product_mut(order.product_id, |product| {
            product.quantity += order.quantity;
            Ok(product.quantity)
        })?;
        self.restocked_orders
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(order.id);
        info!(order = %order.id, product = %order.product_id, restocked, "stock returned");
        self.outbox.stage(MarketEvent::ProductEdited {
            token: token.clone(),
            product_id: order.product_id,
            patch: ProductPatch {
                quantity: Some(restocked),
                ..ProductPatch::default()
            },
        });
        Ok(())
    }
}
