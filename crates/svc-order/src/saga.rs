//! Order placement.
//!
//! Validation runs first and touches nothing; mutations and staged
//! events come only after every check has passed. A redelivered
//! `PlaceOrder` that failed transiently therefore re-runs validation
//! only, and a delivery that reached the mutation step always acks.

use crate::service::OrderService;
use shared_types::entities::{CartLine, Coupon, Order, OrderStatus, Product, Role};
use shared_types::{AccessToken, MarketError};
use shared_bus::MarketEvent;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;

impl OrderService {
    /// Price a cart line, consume its coupon, and create the order.
    pub(crate) fn place_order(
        &self,
        token: &AccessToken,
        line: &CartLine,
    ) -> Result<(), MarketError> {
        let buyer = self
            .users
            .authorize(&self.verifier, token, Some(Role::Customer))?;
        if line.quantity == 0 {
            return Err(MarketError::Validation("quantity must be positive".into()));
        }
        let product = self
            .products
            .get(line.product_id)
            .ok_or_else(|| MarketError::NotFound("product not found".into()))?;
        if product.status != shared_types::entities::ProductStatus::Approved {
            return Err(MarketError::Validation(
                "product is not available for purchase".into(),
            ));
        }
        if product.quantity < line.quantity {
            return Err(MarketError::Validation("insufficient stock".into()));
        }
        if let Some(coupon) = &line.coupon {
            validate_coupon(coupon, &product)?;
            // The buyer must still hold the coupon.
            if !self
                .users
                .get(buyer.id)
                .is_some_and(|u| u.coupon(&coupon.code).is_some())
            {
                return Err(MarketError::NotFound("coupon not found".into()));
            }
        }

        // Discounts floor the unit price to whole cents before the
        // quantity multiply.
        let unit_price = match &line.coupon {
            Some(coupon) => discounted(product.price, coupon.discount_percentage),
            None => product.price,
        };
        let total = unit_price
            .checked_mul(line.quantity)
            .ok_or_else(|| MarketError::Validation("order value overflows".into()))?;

        // Everything checked; mutate and stage.
        if let Some(coupon) = &line.coupon {
            self.users.consume_coupon(buyer.id, &coupon.code)?;
            self.outbox.stage(MarketEvent::CouponUsed {
                token: token.clone(),
                code: coupon.code.clone(),
            });
        }
        let order = Order {
            id: Uuid::new_v4(),
            date: unix_millis(),
            seller_id: product.seller_id,
            user_id: buyer.id,
            product_id: product.id,
            quantity: line.quantity,
            total_value: total,
            status: OrderStatus::Pending,
        };
        info!(order = %order.id, buyer = %buyer.id, product = %product.id, total, "order placed");
        self.write().insert(order.id, order.clone());
        self.outbox.stage(MarketEvent::OrderCreated {
            token: token.clone(),
            order,
        });
        Ok(())
    }
}

/// Re-validate a coupon at consumption time against the product actually
/// being bought.
fn validate_coupon(coupon: &Coupon, product: &Product) -> Result<(), MarketError> {
    if !coupon.discount_in_range() {
        return Err(MarketError::Validation(
            "discount percentage out of range".into(),
        ));
    }
    if !coupon.applies_to(product.id, product.seller_id) {
        return Err(MarketError::Validation(
            "coupon does not apply to this product".into(),
        ));
    }
    Ok(())
}

fn discounted(price: u64, percentage: u8) -> u64 {
    let keep = 100 - u128::from(percentage);
    (u128::from(price) * keep / 100) as u64
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_floors_the_unit_price() {
        assert_eq!(discounted(1000, 20), 800);
        assert_eq!(discounted(999, 10), 899);
        assert_eq!(discounted(1, 90), 0);
        // Large prices survive the intermediate multiply.
        assert_eq!(discounted(u64::MAX, 10), (u128::from(u64::MAX) * 90 / 100) as u64);
    }
}
