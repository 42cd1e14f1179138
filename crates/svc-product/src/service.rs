//! Catalogue authority operations.

use shared_bus::{MarketEvent, Outbox};
use shared_types::entities::{
    OrderId, Product, ProductId, ProductPatch, ProductStatus, Role,
};
use shared_types::{
    AccessToken, MarketError, ProductReplicaStore, TokenVerifier, UserReplicaStore,
};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// The product catalogue authority.
pub struct ProductService {
    pub(crate) products: ProductReplicaStore,
    pub(crate) users: UserReplicaStore,
    pub(crate) verifier: TokenVerifier,
    pub(crate) outbox: Outbox,

    /// Order ids whose stock decrement has been applied.
    pub(crate) applied_orders: Mutex<HashSet<OrderId>>,

    /// Order ids refused for insufficient stock.
    pub(crate) rejected_orders: Mutex<HashSet<OrderId>>,

    /// Order ids whose cancellation restock has been applied.
    pub(crate) restocked_orders: Mutex<HashSet<OrderId>>,
}

impl ProductService {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            products: ProductReplicaStore::new(),
            users: UserReplicaStore::new(),
            verifier,
            outbox: Outbox::new(),
            applied_orders: Mutex::new(HashSet::new()),
            rejected_orders: Mutex::new(HashSet::new()),
            restocked_orders: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    #[must_use]
    pub fn products(&self) -> &ProductReplicaStore {
        &self.products
    }

    #[must_use]
    pub fn users(&self) -> &UserReplicaStore {
        &self.users
    }

    /// List a product. It enters the catalogue pending moderation; the
    /// moderation verdict arrives later as a status edit.
    pub fn add_product(
        &self,
        token: &AccessToken,
        name: &str,
        price: u64,
        quantity: u64,
    ) -> Result<ProductId, MarketError> {
        let seller = self.users.authorize(&self.verifier, token, Some(Role::Seller))?;
        if name.trim().is_empty() {
            return Err(MarketError::Validation("name must not be empty".into()));
        }
        if price == 0 {
            return Err(MarketError::Validation("price must be positive".into()));
        }
        if self.products.by_name(name).is_some() {
            return Err(MarketError::Validation("product name already listed".into()));
        }
        let product = Product::new(Uuid::new_v4(), name, price, quantity, seller.id);
        let id = product.id;
        info!(product = %id, seller = %seller.id, name, "product listed");
        // Inserted here as well as on self-delivery (which is idempotent)
        // so a second listing with the same name cannot slip through
        // before the event settles.
        self.products.insert(product.clone());
        self.outbox.stage(MarketEvent::ProductAdded {
            token: token.clone(),
            product,
        });
        self.outbox.stage(MarketEvent::ModerateProduct {
            token: token.clone(),
            product_id: id,
            name: name.to_string(),
            status: ProductStatus::Pending,
        });
        Ok(id)
    }

    /// Delist one of the caller's own products.
    pub fn remove_product(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), MarketError> {
        let seller = self.users.authorize(&self.verifier, token, Some(Role::Seller))?;
        self.owned_product(product_id, seller.id)?;
        info!(product = %product_id, seller = %seller.id, "product delisted");
        self.outbox.stage(MarketEvent::ProductRemoved {
            token: token.clone(),
            product_id,
        });
        Ok(())
    }

    /// Edit one of the caller's own products. Status is not editable by
    /// sellers; a rename resets it to pending and re-runs moderation.
    pub fn edit_product(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<(), MarketError> {
        let seller = self.users.authorize(&self.verifier, token, Some(Role::Seller))?;
        if patch.status.is_some() {
            return Err(MarketError::Validation(
                "status is set by moderation only".into(),
            ));
        }
        patch.validate()?;
        self.owned_product(product_id, seller.id)?;

        let mut outgoing = patch;
        if let Some(name) = outgoing.name.clone() {
            if self.products.by_name(&name).is_some_and(|p| p.id != product_id) {
                return Err(MarketError::Validation("product name already listed".into()));
            }
            // Renames go back through moderation.
            outgoing.status = Some(ProductStatus::Pending);
            self.outbox.stage(MarketEvent::ModerateProduct {
                token: token.clone(),
                product_id,
                name,
                status: ProductStatus::Pending,
            });
        }
        self.outbox.stage(MarketEvent::ProductEdited {
            token: token.clone(),
            product_id,
            patch: outgoing,
        });
        Ok(())
    }

    /// Rate an approved product, 1 to 5 stars.
    pub fn rate_product(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        rating: u8,
    ) -> Result<(), MarketError> {
        self.users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        if !(1..=5).contains(&rating) {
            return Err(MarketError::Validation("rating must be 1..=5".into()));
        }
        let product = self
            .products
            .get(product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        if product.status != ProductStatus::Approved {
            return Err(MarketError::Validation(
                "only approved products can be rated".into(),
            ));
        }
        self.outbox.stage(MarketEvent::ProductRated {
            token: token.clone(),
            product_id,
            rating,
        });
        Ok(())
    }

    /// File a complaint against a product. Complaints accumulate on the
    /// catalogue authority's record; they do not replicate.
    pub fn file_complaint(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        text: &str,
    ) -> Result<(), MarketError> {
        let customer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(MarketError::Validation("complaint must not be empty".into()));
        }
        info!(product = %product_id, customer = %customer.id, "complaint filed");
        self.products.with_product_mut(product_id, |product| {
            product.complaints.push(text.to_string());
            Ok(())
        })
    }

    fn owned_product(&self, product_id: ProductId, seller_id: Uuid) -> Result<Product, MarketError> {
        let product = self
            .products
            .get(product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        if product.seller_id != seller_id {
            return Err(MarketError::Unauthorized(
                "product belongs to another seller".into(),
            ));
        }
        Ok(product)
    }
}
