//! Coupon fan-out, redemption and retraction across services.

#[cfg(test)]
mod tests {
    use crate::world::World;
    use shared_types::UserReplicaStore;

    /// The user stores of the services that consume coupons.
    fn pools(world: &World) -> [&UserReplicaStore; 3] {
        [
            world.rt.order.users(),
            world.rt.cart.users(),
            world.rt.coupons.users(),
        ]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn creation_fans_out_to_every_customer_pool() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, _) = world.customer("amy").await;

        world.rt.coupons.create_coupon(&seller, "SAVE20", 20, None).unwrap();
        world
            .wait_until("coupon fan-out", || {
                pools(&world).iter().all(|store| {
                    store
                        .get(amy)
                        .is_some_and(|u| u.coupon("SAVE20").is_some())
                })
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn checkout_with_a_coupon_discounts_and_burns_it() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.coupons.create_coupon(&seller, "SAVE20", 20, Some(id)).unwrap();
        world
            .wait_until("coupon fan-out", || {
                pools(&world).iter().all(|store| {
                    store
                        .get(amy)
                        .is_some_and(|u| u.coupon("SAVE20").is_some())
                })
            })
            .await;

        world.rt.cart.edit_line_quantity(&buyer, id, 2).unwrap();
        world.rt.cart.apply_coupon(&buyer, id, "SAVE20").unwrap();
        world.rt.cart.checkout(&buyer).unwrap();

        world
            .wait_until("discounted order", || {
                world
                    .rt
                    .order
                    .orders_for(amy)
                    .first()
                    .is_some_and(|o| o.total_value == 1600)
            })
            .await;
        // Redemption prunes the coupon from every pool.
        world
            .wait_until("coupon burn", || {
                pools(&world).iter().all(|store| {
                    store
                        .get(amy)
                        .is_some_and(|u| u.coupon("SAVE20").is_none())
                })
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deletion_retracts_from_pools_and_cart_lines() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.coupons.create_coupon(&seller, "SAVE20", 20, None).unwrap();
        world
            .wait_until("coupon fan-out", || {
                world
                    .rt
                    .cart
                    .users()
                    .get(amy)
                    .is_some_and(|u| u.coupon("SAVE20").is_some())
            })
            .await;
        world.rt.cart.edit_line_quantity(&buyer, id, 1).unwrap();
        world.rt.cart.apply_coupon(&buyer, id, "SAVE20").unwrap();

        world.rt.coupons.delete_coupon(&seller, "SAVE20").unwrap();
        world
            .wait_until("coupon retraction", || {
                let pools_clear = pools(&world).iter().all(|store| {
                    store
                        .get(amy)
                        .is_some_and(|u| u.coupon("SAVE20").is_none())
                });
                let slot_clear = world
                    .rt
                    .cart
                    .cart_for(amy)
                    .and_then(|c| c.line(id).map(|l| l.coupon.is_none()))
                    .unwrap_or(false);
                pools_clear && slot_clear
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn displaced_coupon_returns_to_the_pool() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.coupons.create_coupon(&seller, "SAVE10", 10, None).unwrap();
        world.rt.coupons.create_coupon(&seller, "SAVE30", 30, None).unwrap();
        world
            .wait_until("both coupons to fan out", || {
                world.rt.cart.users().get(amy).is_some_and(|u| {
                    u.coupon("SAVE10").is_some() && u.coupon("SAVE30").is_some()
                })
            })
            .await;

        world.rt.cart.edit_line_quantity(&buyer, id, 1).unwrap();
        world.rt.cart.apply_coupon(&buyer, id, "SAVE10").unwrap();
        world.rt.cart.apply_coupon(&buyer, id, "SAVE30").unwrap();

        let line = world.rt.cart.cart_for(amy).unwrap().line(id).cloned().unwrap();
        assert_eq!(line.coupon.as_ref().map(|c| c.code.as_str()), Some("SAVE30"));
        // The displaced SAVE10 travels back through the bus into every pool.
        world
            .wait_until("displaced coupon to return", || {
                pools(&world).iter().all(|store| {
                    store
                        .get(amy)
                        .is_some_and(|u| u.coupon("SAVE10").is_some())
                })
            })
            .await;
    }
}
