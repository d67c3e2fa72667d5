mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::errors::ServiceError;
use storefront_api::services::carts::{AddItemInput, UpdateItemInput};

use common::{seed_product, seed_sized_product, seed_user, setup};

#[tokio::test]
async fn empty_cart_is_created_on_first_read() {
    let app = setup().await;
    let user = seed_user(&app, "cart1@example.com").await;

    let cart = app.services().carts.get_cart(user.id).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, dec!(0));
    assert_eq!(cart.item_count, 0);
}

#[tokio::test]
async fn adding_items_updates_denormalized_totals() {
    let app = setup().await;
    let user = seed_user(&app, "cart2@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(250), 10).await;
    let mug = seed_product(&app, "mug", dec!(99), 5).await;

    app.services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: shirt.id,
                size: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    let cart = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: mug.id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.item_count, 3);
    assert_eq!(cart.total, dec!(599));
}

#[tokio::test]
async fn same_product_and_size_merges_into_one_line() {
    let app = setup().await;
    let user = seed_user(&app, "cart3@example.com").await;
    let tee = seed_sized_product(&app, "tee", dec!(100), 5, 5).await;

    let add = |size: &str, quantity| AddItemInput {
        product_id: tee.id,
        size: Some(size.to_string()),
        quantity,
    };

    app.services().carts.add_item(user.id, add("M", 1)).await.unwrap();
    app.services().carts.add_item(user.id, add("L", 1)).await.unwrap();
    let cart = app.services().carts.add_item(user.id, add("M", 2)).await.unwrap();

    // M merged to quantity 3, L stays its own line
    assert_eq!(cart.items.len(), 2);
    let m_line = cart
        .items
        .iter()
        .find(|i| i.size.as_deref() == Some("M"))
        .unwrap();
    assert_eq!(m_line.quantity, 3);
    assert_eq!(cart.item_count, 4);
}

#[tokio::test]
async fn add_rejects_more_than_available_stock() {
    let app = setup().await;
    let user = seed_user(&app, "cart4@example.com").await;
    let scarce = seed_product(&app, "scarce", dec!(10), 2).await;

    let err = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: scarce.id,
                size: None,
                quantity: 3,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // merging may not push the line past what is on hand either
    app.services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: scarce.id,
                size: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    let err = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: scarce.id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
}

#[tokio::test]
async fn sized_product_requires_a_valid_size() {
    let app = setup().await;
    let user = seed_user(&app, "cart5@example.com").await;
    let tee = seed_sized_product(&app, "tee", dec!(100), 5, 5).await;

    let no_size = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: tee.id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(no_size, ServiceError::ValidationError(_)));

    let bad_size = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: tee.id,
                size: Some("XXL".to_string()),
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(bad_size, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_and_remove_recalculate_totals() {
    let app = setup().await;
    let user = seed_user(&app, "cart6@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(200), 10).await;

    let cart = app
        .services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: shirt.id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    let item_id = cart.items[0].id;

    let cart = app
        .services()
        .carts
        .update_item(user.id, item_id, UpdateItemInput { quantity: 4 })
        .await
        .unwrap();
    assert_eq!(cart.total, dec!(800));
    assert_eq!(cart.item_count, 4);

    let cart = app
        .services()
        .carts
        .remove_item(user.id, item_id)
        .await
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, dec!(0));
}

#[tokio::test]
async fn removing_unknown_item_is_not_found() {
    let app = setup().await;
    let user = seed_user(&app, "cart7@example.com").await;

    let err = app
        .services()
        .carts
        .remove_item(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn clear_empties_the_cart() {
    let app = setup().await;
    let user = seed_user(&app, "cart8@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(200), 10).await;

    app.services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: shirt.id,
                size: None,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let cart = app.services().carts.clear(user.id).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.item_count, 0);
    assert_eq!(cart.total, dec!(0));
}

#[tokio::test]
async fn line_price_is_snapshotted_at_add_time() {
    let app = setup().await;
    let user = seed_user(&app, "cart9@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(200), 10).await;

    app.services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id: shirt.id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    // a later price change does not affect the existing line
    app.services()
        .catalog
        .update_product(
            shirt.id,
            storefront_api::services::catalog::UpdateProductInput {
                price: Some(dec!(300)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cart = app.services().carts.get_cart(user.id).await.unwrap();
    assert_eq!(cart.items[0].unit_price, dec!(200));
    assert_eq!(cart.total, dec!(200));
}
