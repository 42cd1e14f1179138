//! Payout ledger state and operations.

use shared_bus::Outbox;
use shared_types::entities::{Cents, Order, OrderId, Role, UserId};
use shared_types::{
    AccessToken, MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use tracing::info;

/// The seller payout ledger.
pub struct PayoutService {
    pub(crate) orders: RwLock<HashMap<OrderId, Order>>,
    pub(crate) products: ProductReplicaStore,
    pub(crate) users: UserReplicaStore,
    pub(crate) verifier: TokenVerifier,
    pub(crate) outbox: Outbox,

    /// Orders already credited, for exactly-once accrual.
    pub(crate) credited: Mutex<HashSet<OrderId>>,

    /// Accrued earnings per seller for the current period.
    pub(crate) earnings: RwLock<HashMap<UserId, Cents>>,
}

impl PayoutService {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            products: ProductReplicaStore::new(),
            users: UserReplicaStore::new(),
            verifier,
            outbox: Outbox::new(),
            credited: Mutex::new(HashSet::new()),
            earnings: RwLock::new(HashMap::new()),
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

    /// The caller's accrued earnings for the current period.
    pub fn monthly_earnings(&self, token: &AccessToken) -> Result<Cents, MarketError> {
        let seller = self
            .users
            .authorize(&self.verifier, token, Some(Role::Seller))?;
        Ok(self
            .earnings
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&seller.id)
            .copied()
            .unwrap_or(0))
    }

    /// Zero every seller's ledger for a new period. Admin only. Credited
    /// order ids are kept so past orders can never accrue again.
    pub fn reset_monthly_earnings(&self, token: &AccessToken) -> Result<(), MarketError> {
        self.users
            .authorize(&self.verifier, token, Some(Role::Admin))?;
        self.earnings
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        info!("payout ledger reset for a new period");
        Ok(())
    }

    pub(crate) fn credit(&self, order: &Order) {
        {
            let mut credited = self.credited.lock().unwrap_or_else(|p| p.into_inner());
            if !credited.insert(order.id) {
                return;
            }
        }
        let mut earnings = self.earnings.write().unwrap_or_else(|p| p.into_inner());
        let balance = earnings.entry(order.seller_id).or_insert(0);
        *balance += order.total_value;
        info!(order = %order.id, seller = %order.seller_id, amount = order.total_value, balance = *balance, "earnings credited");
    }
}
