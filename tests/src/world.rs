//! A running marketplace for integration tests.
//!
//! Propagation over the bus is asynchronous, so fixtures never assert
//! immediately after an operation: they poll with [`World::wait_until`]
//! for the state they caused to appear, with a hard deadline.

use marketplace_runtime::{MarketRuntime, RuntimeConfig};
use shared_types::entities::{ProductId, ProductStatus, Role, UserId};
use shared_types::{AccessToken, UserReplicaStore};
use std::time::Duration;

const SECRET: &[u8] = b"integration-test-secret-0123456789";
const DEADLINE: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

/// Every service wired and running on one bus.
pub struct World {
    pub rt: MarketRuntime,
}

impl World {
    /// Build and start a full runtime.
    #[must_use]
    pub fn start() -> Self {
        let mut rt = MarketRuntime::new(RuntimeConfig::for_testing(SECRET));
        rt.start();
        Self { rt }
    }

    /// Poll until `cond` holds, panicking with `what` on timeout.
    pub async fn wait_until(&self, what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + DEADLINE;
        while !cond() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Every consumer's user replica store.
    #[must_use]
    pub fn user_stores(&self) -> [&UserReplicaStore; 5] {
        [
            self.rt.product.users(),
            self.rt.order.users(),
            self.rt.cart.users(),
            self.rt.coupons.users(),
            self.rt.payout.users(),
        ]
    }

    /// Sign up and log in, then wait for the session to reach every
    /// replica so follow-up operations are authorized anywhere.
    pub async fn user(&self, name: &str, role: Role) -> (UserId, AccessToken) {
        let id = self
            .rt
            .authentication
            .signup(
                name,
                &format!("{name}@shop.test"),
                "1 Main St",
                "hunter2",
                role,
            )
            .expect("signup");
        let token = self.rt.authentication.login(name, "hunter2").expect("login");
        let encoded = token.encode();
        self.wait_until("session to replicate", || {
            self.user_stores()
                .iter()
                .all(|s| s.get(id).is_some_and(|u| u.has_session(&encoded)))
        })
        .await;
        (id, token)
    }

    pub async fn customer(&self, name: &str) -> (UserId, AccessToken) {
        self.user(name, Role::Customer).await
    }

    pub async fn seller(&self, name: &str) -> (UserId, AccessToken) {
        self.user(name, Role::Seller).await
    }

    /// List a product and wait for it to come back approved in every
    /// replica, moderation round-trip included.
    pub async fn approved_product(
        &self,
        seller_token: &AccessToken,
        name: &str,
        price: u64,
        quantity: u64,
    ) -> ProductId {
        let id = self
            .rt
            .product
            .add_product(seller_token, name, price, quantity)
            .expect("add_product");
        self.wait_until("product approval to replicate", || {
            [
                self.rt.product.products(),
                self.rt.order.products(),
                self.rt.cart.products(),
                self.rt.coupons.products(),
                self.rt.payout.products(),
            ]
            .iter()
            .all(|s| {
                s.get(id)
                    .is_some_and(|p| p.status == ProductStatus::Approved)
            })
        })
        .await;
        id
    }
}
