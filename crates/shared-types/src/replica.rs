//! # Replica Stores
//!
//! Each service owns a private, denormalized projection of the entities it
//! needs. These stores centralize the projection logic that would otherwise
//! be duplicated per service: insertion is idempotent (a redelivered
//! creation event must treat "already exists" as success), session lists
//! are set-like, and coupon fan-out/retraction touches every customer
//! replica.
//!
//! Stores are mutated only by the owning service's event handlers or its
//! own authoritative writes. Interior mutability via `RwLock` keeps the
//! per-service concurrency model: many readers, one writer, no cross-store
//! locking.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::entities::{
    Coupon, Product, ProductId, ProductPatch, Role, UserId, UserPatch, UserReplica,
};
use crate::security::{AccessToken, TokenVerifier};
use crate::MarketError;

/// A service-local projection of users, keyed by id with a name lookup.
#[derive(Default)]
pub struct UserReplicaStore {
    users: RwLock<HashMap<UserId, UserReplica>>,
}

impl UserReplicaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a replica user. Idempotent: an already-present id is success.
    pub fn insert(&self, user: UserReplica) {
        let mut users = self.write();
        if users.contains_key(&user.id) {
            debug!(user = %user.id, "replica user already present, skipping insert");
            return;
        }
        users.insert(user.id, user);
    }

    /// Removes a user, returning the removed replica if it existed.
    pub fn remove(&self, id: UserId) -> Option<UserReplica> {
        self.write().remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: UserId) -> Option<UserReplica> {
        self.read().get(&id).cloned()
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<UserReplica> {
        self.read().values().find(|u| u.name == name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Verifies the token signature, requires the principal in this
    /// replica with the token among its active sessions, and optionally
    /// requires a role.
    pub fn authorize(
        &self,
        verifier: &TokenVerifier,
        token: &AccessToken,
        role: Option<Role>,
    ) -> Result<UserReplica, MarketError> {
        let principal = verifier.verify(token)?;
        let users = self.read();
        let user = users
            .get(&principal)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        if !user.has_session(&token.encode()) {
            return Err(MarketError::Unauthorized("no such session".into()));
        }
        if let Some(required) = role {
            if user.role != required {
                return Err(MarketError::Unauthorized(format!(
                    "operation requires the {required:?} role"
                )));
            }
        }
        Ok(user.clone())
    }

    /// Appends a session token to the named user.
    pub fn record_login(&self, name: &str, encoded_token: &str) -> Result<(), MarketError> {
        let mut users = self.write();
        let user = users
            .values_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        if !user.has_session(encoded_token) {
            user.tokens.push(encoded_token.to_string());
        }
        Ok(())
    }

    /// Removes a session token. Removing an absent token is a no-op.
    pub fn record_logout(&self, id: UserId, encoded_token: &str) -> Result<(), MarketError> {
        let mut users = self.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        user.tokens.retain(|t| t != encoded_token);
        Ok(())
    }

    /// Applies an allow-listed profile patch to the replica. Only the name
    /// is projected here; the authoritative record holds the rest.
    pub fn apply_patch(&self, id: UserId, patch: &UserPatch) -> Result<(), MarketError> {
        patch.validate()?;
        let mut users = self.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        Ok(())
    }

    /// Copies a coupon into its seller's pool and every customer's pool.
    /// Idempotent by code per user, so redelivered fan-outs re-converge.
    pub fn fan_out_coupon(&self, coupon: &Coupon) {
        let mut users = self.write();
        for user in users.values_mut() {
            if user.id == coupon.seller_id || user.role == Role::Customer {
                user.add_coupon(coupon.clone());
            }
        }
    }

    /// Whether any pool currently holds the code.
    #[must_use]
    pub fn coupon_in_circulation(&self, code: &str) -> bool {
        self.read()
            .values()
            .any(|u| u.coupons.iter().any(|c| c.code == code))
    }

    /// Finds a coupon by code in any pool.
    #[must_use]
    pub fn find_coupon(&self, code: &str) -> Option<Coupon> {
        self.read()
            .values()
            .flat_map(|u| u.coupons.iter())
            .find(|c| c.code == code)
            .cloned()
    }

    /// Retracts a coupon code from every pool it appears in.
    pub fn retract_coupon(&self, code: &str) {
        let mut users = self.write();
        for user in users.values_mut() {
            user.coupons.retain(|c| c.code != code);
        }
    }

    /// Removes a coupon from one user's pool, returning it.
    pub fn consume_coupon(&self, id: UserId, code: &str) -> Result<Coupon, MarketError> {
        let mut users = self.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        user.take_coupon(code)
            .ok_or_else(|| MarketError::NotFound("coupon not found".into()))
    }

    /// Removes a coupon code from one user's pool if present. Unlike
    /// [`UserReplicaStore::consume_coupon`], an absent coupon is success:
    /// a redelivered `CouponUsed` finds the pool already pruned.
    pub fn prune_coupon(&self, id: UserId, code: &str) -> Result<(), MarketError> {
        let mut users = self.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        user.coupons.retain(|c| c.code != code);
        Ok(())
    }

    /// Returns a displaced coupon to a user's pool. Idempotent by code.
    pub fn return_coupon(&self, id: UserId, coupon: Coupon) -> Result<(), MarketError> {
        let mut users = self.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        user.add_coupon(coupon);
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, UserReplica>> {
        self.users.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, UserReplica>> {
        self.users.write().unwrap_or_else(|p| p.into_inner())
    }
}

/// A service-local projection of products.
#[derive(Default)]
pub struct ProductReplicaStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl ProductReplicaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a replica product. Idempotent: an already-present id is
    /// success.
    pub fn insert(&self, product: Product) {
        let mut products = self.write();
        if products.contains_key(&product.id) {
            debug!(product = %product.id, "replica product already present, skipping insert");
            return;
        }
        products.insert(product.id, product);
    }

    /// Removes a product owned by the given seller.
    pub fn remove(&self, id: ProductId, seller_id: UserId) -> Result<(), MarketError> {
        let mut products = self.write();
        match products.get(&id) {
            Some(p) if p.seller_id == seller_id => {
                products.remove(&id);
                Ok(())
            }
            Some(_) => Err(MarketError::Unauthorized(
                "product belongs to another seller".into(),
            )),
            None => Err(MarketError::NotFound("product not found".into())),
        }
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<Product> {
        self.read().get(&id).cloned()
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Product> {
        self.read().values().find(|p| p.name == name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Applies an allow-listed field patch. Replica updates are
    /// field-scoped, so racing edits are last-write-wins per field.
    pub fn apply_patch(&self, id: ProductId, patch: &ProductPatch) -> Result<(), MarketError> {
        patch.validate()?;
        let mut products = self.write();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        patch.apply_to(product);
        Ok(())
    }

    /// Folds one rating into the running average.
    pub fn apply_rating(&self, id: ProductId, rating: u8) -> Result<(), MarketError> {
        if rating > 5 {
            return Err(MarketError::Validation("rating must be 0..=5".into()));
        }
        let mut products = self.write();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        product.apply_rating(rating);
        Ok(())
    }

    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ProductId, Product>> {
        self.products.read().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ProductId, Product>> {
        self.products.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Runs a closure with mutable access to one product under the write
    /// lock. Used by the product authority for check-then-mutate stock
    /// operations that must not race.
    pub fn with_product_mut<R>(
        &self,
        id: ProductId,
        f: impl FnOnce(&mut Product) -> Result<R, MarketError>,
    ) -> Result<R, MarketError> {
        let mut products = self.write();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        f(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::TokenSigner;
    use uuid::Uuid;

    fn seeded_user(store: &UserReplicaStore, role: Role, name: &str) -> UserReplica {
        let user = UserReplica::new(Uuid::new_v4(), name, role);
        store.insert(user.clone());
        user
    }

    fn coupon_from(seller: &UserReplica, code: &str) -> Coupon {
        Coupon {
            code: code.into(),
            discount_percentage: 20,
            product_id: None,
            product_name: None,
            seller_id: seller.id,
            seller_name: seller.name.clone(),
        }
    }

    #[test]
    fn replayed_insert_does_not_duplicate() {
        let store = UserReplicaStore::new();
        let user = seeded_user(&store, Role::Customer, "amy");
        store.insert(user);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn authorize_requires_active_session_and_role() {
        let store = UserReplicaStore::new();
        let signer = TokenSigner::new(b"secret".to_vec());
        let user = seeded_user(&store, Role::Seller, "mike");
        let token = signer.sign(user.id);

        // No session recorded yet.
        assert!(matches!(
            store.authorize(&signer.verifier(), &token, None),
            Err(MarketError::Unauthorized(_))
        ));

        store.record_login("mike", &token.encode()).unwrap();
        assert!(store
            .authorize(&signer.verifier(), &token, Some(Role::Seller))
            .is_ok());
        assert!(matches!(
            store.authorize(&signer.verifier(), &token, Some(Role::Customer)),
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[test]
    fn logout_removes_only_the_given_session() {
        let store = UserReplicaStore::new();
        let signer = TokenSigner::new(b"secret".to_vec());
        let user = seeded_user(&store, Role::Customer, "amy");
        let first = signer.sign_at(user.id, 1);
        let second = signer.sign_at(user.id, 2);
        store.record_login("amy", &first.encode()).unwrap();
        store.record_login("amy", &second.encode()).unwrap();

        store.record_logout(user.id, &first.encode()).unwrap();
        let amy = store.get(user.id).unwrap();
        assert_eq!(amy.tokens, vec![second.encode()]);

        // Removing an absent token is a no-op success.
        store.record_logout(user.id, &first.encode()).unwrap();
    }

    #[test]
    fn coupon_fan_out_reaches_seller_and_customers_only() {
        let store = UserReplicaStore::new();
        let seller = seeded_user(&store, Role::Seller, "mike");
        let other_seller = seeded_user(&store, Role::Seller, "lin");
        let customer = seeded_user(&store, Role::Customer, "amy");
        let admin = seeded_user(&store, Role::Admin, "root");

        store.fan_out_coupon(&coupon_from(&seller, "SAVE20"));
        assert_eq!(store.get(seller.id).unwrap().coupons.len(), 1);
        assert_eq!(store.get(customer.id).unwrap().coupons.len(), 1);
        assert!(store.get(other_seller.id).unwrap().coupons.is_empty());
        assert!(store.get(admin.id).unwrap().coupons.is_empty());

        // Redelivered fan-out must not duplicate.
        store.fan_out_coupon(&coupon_from(&seller, "SAVE20"));
        assert_eq!(store.get(customer.id).unwrap().coupons.len(), 1);

        store.retract_coupon("SAVE20");
        assert!(store.get(seller.id).unwrap().coupons.is_empty());
        assert!(store.get(customer.id).unwrap().coupons.is_empty());
    }

    #[test]
    fn consume_and_return_coupon_round_trip() {
        let store = UserReplicaStore::new();
        let seller = seeded_user(&store, Role::Seller, "mike");
        let customer = seeded_user(&store, Role::Customer, "amy");
        store.fan_out_coupon(&coupon_from(&seller, "SAVE20"));

        let coupon = store.consume_coupon(customer.id, "SAVE20").unwrap();
        assert!(store.get(customer.id).unwrap().coupons.is_empty());
        assert!(store.consume_coupon(customer.id, "SAVE20").is_err());

        store.return_coupon(customer.id, coupon).unwrap();
        assert_eq!(store.get(customer.id).unwrap().coupons.len(), 1);
    }

    #[test]
    fn product_remove_checks_ownership() {
        let store = ProductReplicaStore::new();
        let seller = Uuid::new_v4();
        let product = Product::new(Uuid::new_v4(), "Widget", 1000, 5, seller);
        store.insert(product.clone());

        assert!(matches!(
            store.remove(product.id, Uuid::new_v4()),
            Err(MarketError::Unauthorized(_))
        ));
        store.remove(product.id, seller).unwrap();
        assert!(store.get(product.id).is_none());
    }

    #[test]
    fn patch_rejects_out_of_list_values_wholesale() {
        let store = ProductReplicaStore::new();
        let product = Product::new(Uuid::new_v4(), "Widget", 1000, 5, Uuid::new_v4());
        store.insert(product.clone());

        let bad = ProductPatch {
            name: Some(String::new()),
            price: Some(1),
            ..ProductPatch::default()
        };
        assert!(store.apply_patch(product.id, &bad).is_err());
        // Nothing applied.
        assert_eq!(store.get(product.id).unwrap().price, 1000);
    }
}
