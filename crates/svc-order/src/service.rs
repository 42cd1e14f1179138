//! Order authority state and operations.

use shared_bus::{MarketEvent, Outbox};
use shared_types::entities::{Order, OrderId, OrderStatus, Role, UserId};
use shared_types::{
    AccessToken, MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// The order authority.
pub struct OrderService {
    pub(crate) orders: RwLock<HashMap<OrderId, Order>>,
    pub(crate) products: ProductReplicaStore,
    pub(crate) users: UserReplicaStore,
    pub(crate) verifier: TokenVerifier,
    pub(crate) outbox: Outbox,
}

impl OrderService {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
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

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.read().get(&id).cloned()
    }

    /// All orders placed by a customer, newest first.
    #[must_use]
    pub fn orders_for(&self, user_id: UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .read()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.date.cmp(&a.date));
        orders
    }

    /// Request a status change. The caller must be the buyer, the seller
    /// of the ordered product, or an admin, and the transition must be
    /// forward-only. The change is applied when the emitted `OrderEdited`
    /// comes back through the handler.
    pub fn edit_order(
        &self,
        token: &AccessToken,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), MarketError> {
        let principal = self.users.authorize(&self.verifier, token, None)?;
        let order = self
            .order(order_id)
            .ok_or_else(|| MarketError::NotFound("order not found".into()))?;
        let involved = principal.id == order.user_id
            || principal.id == order.seller_id
            || principal.role == Role::Admin;
        if !involved {
            return Err(MarketError::Unauthorized(
                "order belongs to someone else".into(),
            ));
        }
        if !order.status.can_transition_to(status) {
            return Err(MarketError::Validation(format!(
                "cannot move order from {:?} to {status:?}",
                order.status
            )));
        }
        info!(order = %order_id, from = ?order.status, to = ?status, "status change requested");
        self.outbox.stage(MarketEvent::OrderEdited {
            token: token.clone(),
            order_id,
            status,
        });
        Ok(())
    }

    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<OrderId, Order>> {
        self.orders.read().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<OrderId, Order>> {
        self.orders.write().unwrap_or_else(|p| p.into_inner())
    }
}
