//! Listings and the moderation round-trip.

#[cfg(test)]
mod tests {
    use crate::world::World;
    use shared_types::entities::{ProductPatch, ProductStatus};

    #[tokio::test(flavor = "multi_thread")]
    async fn clean_listings_are_approved_everywhere() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        world.approved_product(&seller, "Widget", 1000, 5).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deny_listed_names_are_rejected() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;

        let id = world
            .rt
            .product
            .add_product(&seller, "Fake Rolex", 99900, 3)
            .unwrap();
        world
            .wait_until("rejection to replicate", || {
                world
                    .rt
                    .order
                    .products()
                    .get(id)
                    .is_some_and(|p| p.status == ProductStatus::Rejected)
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn renames_go_back_through_moderation() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world
            .rt
            .product
            .edit_product(
                &seller,
                id,
                ProductPatch {
                    name: Some("Stolen Goods".into()),
                    ..ProductPatch::default()
                },
            )
            .unwrap();
        world
            .wait_until("re-moderation to replicate", || {
                world
                    .rt
                    .cart
                    .products()
                    .get(id)
                    .is_some_and(|p| p.name == "Stolen Goods" && p.status == ProductStatus::Rejected)
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn price_edits_replicate() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world
            .rt
            .product
            .edit_product(
                &seller,
                id,
                ProductPatch {
                    price: Some(1500),
                    ..ProductPatch::default()
                },
            )
            .unwrap();
        world
            .wait_until("price edit to replicate", || {
                world
                    .rt
                    .order
                    .products()
                    .get(id)
                    .is_some_and(|p| p.price == 1500 && p.status == ProductStatus::Approved)
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delisting_removes_the_product_and_cart_lines() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (amy, buyer) = world.customer("amy").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.cart.edit_line_quantity(&buyer, id, 2).unwrap();
        world.rt.product.remove_product(&seller, id).unwrap();

        world
            .wait_until("delisting to replicate", || {
                world.rt.order.products().get(id).is_none()
                    && world
                        .rt
                        .cart
                        .cart_for(amy)
                        .is_some_and(|c| c.lines.is_empty())
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ratings_average_across_replicas() {
        let world = World::start();
        let (_, seller) = world.seller("mike").await;
        let (_, amy) = world.customer("amy").await;
        let (_, bob) = world.customer("bob").await;
        let id = world.approved_product(&seller, "Widget", 1000, 5).await;

        world.rt.product.rate_product(&amy, id, 5).unwrap();
        world.rt.product.rate_product(&bob, id, 2).unwrap();

        world
            .wait_until("ratings to replicate", || {
                world.rt.coupons.products().get(id).is_some_and(|p| {
                    p.total_ratings == 2 && (p.rating - 3.5).abs() < f64::EPSILON
                })
            })
            .await;
    }
}
