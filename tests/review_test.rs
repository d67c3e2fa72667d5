mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::errors::ServiceError;
use storefront_api::services::carts::AddItemInput;
use storefront_api::services::orders::CheckoutInput;
use storefront_api::services::reviews::SubmitReviewInput;

use common::{reload_product, seed_product, seed_user, setup, TestApp};

fn review(rating: i16) -> SubmitReviewInput {
    SubmitReviewInput {
        rating,
        title: None,
        comment: "solid".to_string(),
    }
}

/// Buys one unit of the product so the reviewer qualifies.
async fn purchase(app: &TestApp, user: &storefront_api::entities::user::Model, product_id: Uuid) {
    app.services()
        .carts
        .add_item(
            user.id,
            AddItemInput {
                product_id,
                size: None,
                quantity: 1,
            },
        )
        .await
        .unwrap();
    app.services()
        .orders
        .checkout(
            user.id,
            CheckoutInput {
                address_id: user.addresses.0[0].id,
                payment_method: "cod".to_string(),
                coupon_code: None,
                notes: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn reviews_require_a_purchase() {
    let app = setup().await;
    let user = seed_user(&app, "rev1@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 10).await;

    let err = app
        .services()
        .reviews
        .submit(user.id, shirt.id, review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let err = app
        .services()
        .reviews
        .submit(user.id, Uuid::new_v4(), review(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn submitting_updates_the_product_aggregates() {
    let app = setup().await;
    let alice = seed_user(&app, "alice@example.com").await;
    let bob = seed_user(&app, "bob@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 10).await;

    purchase(&app, &alice, shirt.id).await;
    purchase(&app, &bob, shirt.id).await;

    app.services()
        .reviews
        .submit(alice.id, shirt.id, review(5))
        .await
        .unwrap();
    app.services()
        .reviews
        .submit(bob.id, shirt.id, review(4))
        .await
        .unwrap();

    let product = reload_product(&app, shirt.id).await;
    assert_eq!(product.review_count, 2);
    assert_eq!(product.rating, dec!(4.5));
}

#[tokio::test]
async fn one_review_per_customer_per_product() {
    let app = setup().await;
    let user = seed_user(&app, "rev2@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 10).await;
    purchase(&app, &user, shirt.id).await;

    app.services()
        .reviews
        .submit(user.id, shirt.id, review(5))
        .await
        .unwrap();
    let err = app
        .services()
        .reviews
        .submit(user.id, shirt.id, review(3))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let product = reload_product(&app, shirt.id).await;
    assert_eq!(product.review_count, 1);
}

#[tokio::test]
async fn unapproving_recomputes_and_hides_the_review() {
    let app = setup().await;
    let alice = seed_user(&app, "alice@example.com").await;
    let bob = seed_user(&app, "bob@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 10).await;
    purchase(&app, &alice, shirt.id).await;
    purchase(&app, &bob, shirt.id).await;

    let harsh = app
        .services()
        .reviews
        .submit(alice.id, shirt.id, review(1))
        .await
        .unwrap();
    app.services()
        .reviews
        .submit(bob.id, shirt.id, review(5))
        .await
        .unwrap();
    assert_eq!(reload_product(&app, shirt.id).await.rating, dec!(3));

    app.services()
        .reviews
        .set_approval(harsh.id, false)
        .await
        .unwrap();

    let product = reload_product(&app, shirt.id).await;
    assert_eq!(product.review_count, 1);
    assert_eq!(product.rating, dec!(5));

    let (visible, total) = app
        .services()
        .reviews
        .list_for_product(shirt.id, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(visible[0].rating, 5);
    // moderation still sees everything
    let (_, total) = app.services().reviews.list_all(1, 20).await.unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn deleting_the_only_review_zeroes_the_aggregates() {
    let app = setup().await;
    let user = seed_user(&app, "rev3@example.com").await;
    let shirt = seed_product(&app, "shirt", dec!(300), 10).await;
    purchase(&app, &user, shirt.id).await;

    let submitted = app
        .services()
        .reviews
        .submit(user.id, shirt.id, review(4))
        .await
        .unwrap();
    app.services().reviews.delete(submitted.id).await.unwrap();

    let product = reload_product(&app, shirt.id).await;
    assert_eq!(product.review_count, 0);
    assert_eq!(product.rating, dec!(0));

    let err = app.services().reviews.delete(submitted.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
