//! The full order saga: cart → order → stock → payout.

#[cfg(test)]
mod tests {
    use crate::world::World;
    use shared_types::entities::OrderStatus;

    #[tokio::test(flavor = "multi_thread")]
    async fn checkout_creates_an_order_and_reserves_stock() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.cart.edit_line_quantity(&buyer, id, 2).unwrap();
        let outcomes = world.rt.cart.checkout(&buyer).unwrap();
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        // The ordered line left the cart immediately.
        assert!(world.rt.cart.cart_for(amy).unwrap().lines.is_empty());

        world
            .wait_until("order creation", || {
                world.rt.order.orders_for(amy).len() == 1
            })
            .await;
        let order = world.rt.order.orders_for(amy).remove(0);
        assert_eq!(order.total_value, 2000);
        assert_eq!(order.status, OrderStatus::Pending);

        world
            .wait_until("stock decrement to replicate", || {
                world.rt.cart.products().get(id).is_some_and(|p| p.quantity == 3)
                    && world.rt.product.products().get(id).is_some_and(|p| p.quantity == 3)
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delivery_credits_the_seller() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.cart.edit_line_quantity(&buyer, id, 3).unwrap();
        world.rt.cart.checkout(&buyer).unwrap();
        world
            .wait_until("order creation", || {
                !world.rt.order.orders_for(amy).is_empty()
            })
            .await;
        let order = world.rt.order.orders_for(amy).remove(0);

        world
            .rt
            .order
            .edit_order(&buyer, order.id, OrderStatus::Shipped)
            .unwrap();
        world
            .wait_until("shipping to apply", || {
                world.rt.order.order(order.id).unwrap().status == OrderStatus::Shipped
            })
            .await;
        world
            .rt
            .order
            .edit_order(&buyer, order.id, OrderStatus::Delivered)
            .unwrap();

        world
            .wait_until("earnings to accrue", || {
                world.rt.payout.monthly_earnings(&seller).unwrap_or(0) == 3000
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_restocks_exactly_once() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.cart.edit_line_quantity(&buyer, id, 2).unwrap();
        world.rt.cart.checkout(&buyer).unwrap();
        world
            .wait_until("stock decrement", || {
                world.rt.product.products().get(id).is_some_and(|p| p.quantity == 3)
            })
            .await;

        let order = world.rt.order.orders_for(amy).remove(0);
        world
            .rt
            .order
            .edit_order(&buyer, order.id, OrderStatus::Cancelled)
            .unwrap();

        world
            .wait_until("restock to replicate", || {
                world.rt.product.products().get(id).is_some_and(|p| p.quantity == 5)
                    && world.rt.order.products().get(id).is_some_and(|p| p.quantity == 5)
            })
            .await;
        assert_eq!(
            world.rt.order.order(order.id).unwrap().status,
            OrderStatus::Cancelled
        );
        // No payout for a cancelled order.
        assert_eq!(world.rt.payout.monthly_earnings(&seller).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn racing_buyers_cannot_oversell_the_last_unit() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, amy_token) = world.customer("amy").await;
        let (bob, bob_token) = world.customer("bob").await;
        let id = world.approved_product(&seller, "Rare Widget", 5000, 1).await;

        // Both carts validate against the same replica snapshot.
        world.rt.cart.edit_line_quantity(&amy_token, id, 1).unwrap();
        world.rt.cart.edit_line_quantity(&bob_token, id, 1).unwrap();
        world.rt.cart.checkout(&amy_token).unwrap();
        world.rt.cart.checkout(&bob_token).unwrap();

        world
            .wait_until("both orders to settle", || {
                let orders: Vec<_> = world
                    .rt
                    .order
                    .orders_for(amy)
                    .into_iter()
                    .chain(world.rt.order.orders_for(bob))
                    .collect();
                orders.len() == 2
                    && orders.iter().filter(|o| o.status == OrderStatus::Cancelled).count() == 1
                    && orders.iter().filter(|o| o.status == OrderStatus::Pending).count() == 1
            })
            .await;

        // Stock ends at zero, never negative, in every replica.
        for store in [
            world.rt.product.products(),
            world.rt.order.products(),
            world.rt.cart.products(),
        ] {
            assert_eq!(store.get(id).unwrap().quantity, 0);
        }
    }
}
