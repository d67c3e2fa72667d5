mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::errors::ServiceError;
use storefront_api::services::catalog::UpdateProductInput;
use storefront_api::entities::product::ProductStatus;

use common::{seed_product, seed_user, setup};

#[tokio::test]
async fn wishlist_holds_one_entry_per_product() {
    let app = setup().await;
    let user = seed_user(&app, "wish1@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 5).await;

    app.services().wishlist.add(user.id, shirt.id).await.unwrap();
    // adding again is a quiet no-op
    app.services().wishlist.add(user.id, shirt.id).await.unwrap();

    let entries = app.services().wishlist.list(user.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].product.id, shirt.id);
}

#[tokio::test]
async fn only_live_products_can_be_wished() {
    let app = setup().await;
    let user = seed_user(&app, "wish2@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 5).await;

    app.services()
        .catalog
        .update_product(
            shirt.id,
            UpdateProductInput {
                status: Some(ProductStatus::Draft),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = app
        .services()
        .wishlist
        .add(user.id, shirt.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let err = app
        .services()
        .wishlist
        .add(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn removing_clears_the_entry_exactly_once() {
    let app = setup().await;
    let user = seed_user(&app, "wish3@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 5).await;

    app.services().wishlist.add(user.id, shirt.id).await.unwrap();
    app.services().wishlist.remove(user.id, shirt.id).await.unwrap();
    assert!(app.services().wishlist.list(user.id).await.unwrap().is_empty());

    let err = app
        .services()
        .wishlist
        .remove(user.id, shirt.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn archived_products_stay_listed() {
    let app = setup().await;
    let user = seed_user(&app, "wish4@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 5).await;
    let mug = seed_product(&app, "mug", dec!(100), 5).await;

    app.services().wishlist.add(user.id, shirt.id).await.unwrap();
    app.services().wishlist.add(user.id, mug.id).await.unwrap();

    app.services()
        .catalog
        .update_product(
            shirt.id,
            UpdateProductInput {
                status: Some(ProductStatus::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // archiving hides a product from the storefront, not from saved lists
    let entries = app.services().wishlist.list(user.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.product.id == shirt.id));
}
