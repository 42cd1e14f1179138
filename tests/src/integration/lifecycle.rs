//! User lifecycle across services: replicas, sessions, carts.

#[cfg(test)]
mod tests {
    use crate::world::World;
    use shared_types::entities::UserPatch;
    use shared_types::MarketError;

    #[tokio::test(flavor = "multi_thread")]
    async fn signup_replicates_and_creates_a_cart() {
        let world = World::start();
        let (amy, _) = world.customer("amy").await;

        for store in world.user_stores() {
            assert_eq!(store.get(amy).unwrap().name, "amy");
        }
        world
            .wait_until("cart creation", || world.rt.cart.cart_for(amy).is_some())
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn logout_revokes_the_session_everywhere() {
        let world = World::start();
        let (_, token) = world.seller("mike").await;

        world.rt.authentication.logout(&token).unwrap();
        world
            .wait_until("logout to replicate", || {
                world
                    .rt
                    .product
                    .add_product(&token, "Widget", 1000, 5)
                    .is_err()
            })
            .await;
        assert!(matches!(
            world.rt.product.add_product(&token, "Widget", 1000, 5),
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn profile_rename_reaches_every_replica() {
        let world = World::start();
        let (amy, token) = world.customer("amy").await;

        world
            .rt
            .authentication
            .edit_profile(
                &token,
                UserPatch {
                    name: Some("amelia".into()),
                    ..UserPatch::default()
                },
            )
            .unwrap();
        world
            .wait_until("rename to replicate", || {
                world
                    .user_stores()
                    .iter()
                    .all(|s| s.get(amy).is_some_and(|u| u.name == "amelia"))
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn account_removal_cleans_up_everywhere() {
        let world = World::start();
        let (amy, token) = world.customer("amy").await;
        world
            .wait_until("cart creation", || world.rt.cart.cart_for(amy).is_some())
            .await;

        world.rt.authentication.remove_account(&token).unwrap();
        world
            .wait_until("removal to replicate", || {
                world.user_stores().iter().all(|s| s.get(amy).is_none())
                    && world.rt.cart.cart_for(amy).is_none()
            })
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn admin_removal_by_name() {
        let world = World::start();
        world
            .rt
            .authentication
            .bootstrap_admin("root", "root@shop.test", "HQ", "s3cret")
            .unwrap();
        let admin_token = world.rt.authentication.login("root", "s3cret").unwrap();
        let (amy, _) = world.customer("amy").await;

        // The admin session has to reach the replicas too.
        let encoded = admin_token.encode();
        world
            .wait_until("admin session to replicate", || {
                world
                    .user_stores()
                    .iter()
                    .all(|s| s.by_name("root").is_some_and(|u| u.has_session(&encoded)))
            })
            .await;

        world
            .rt
            .authentication
            .admin_remove_user(&admin_token, "amy")
            .unwrap();
        world
            .wait_until("admin removal to replicate", || {
                world.user_stores().iter().all(|s| s.get(amy).is_none())
            })
            .await;
    }
}
