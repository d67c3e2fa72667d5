mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::entities::product::{ProductStatus, SizeStock, SizeStocks};
use storefront_api::errors::ServiceError;
use storefront_api::services::catalog::{
    CreateBrandInput, CreateCategoryInput, CreateProductInput, ProductFilter, UpdateProductInput,
};

use common::{reload_product, seed_product, setup};

fn product_input(name: &str, price: rust_decimal::Decimal, stock: i32) -> CreateProductInput {
    CreateProductInput {
        name: name.to_string(),
        slug: None,
        description: String::new(),
        price,
        compare_at_price: None,
        category_id: None,
        brand_id: None,
        images: Vec::new(),
        stock,
        size_stocks: SizeStocks::default(),
        status: Some(ProductStatus::Active),
    }
}

#[tokio::test]
async fn slugs_are_derived_and_kept_unique() {
    let app = setup().await;

    let created = app
        .services()
        .catalog
        .create_product(product_input("Linen Shirt  (Blue)", dec!(499), 5))
        .await
        .unwrap();
    assert_eq!(created.slug, "linen-shirt-blue");

    let err = app
        .services()
        .catalog
        .create_product(product_input("Linen Shirt (Blue)", dec!(599), 5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn sized_products_derive_flat_stock_from_the_buckets() {
    let app = setup().await;

    let mut input = product_input("Tee", dec!(199), 0);
    input.size_stocks = SizeStocks(vec![
        SizeStock {
            size: "M".to_string(),
            stock: 3,
        },
        SizeStock {
            size: "L".to_string(),
            stock: 4,
        },
    ]);
    let created = app.services().catalog.create_product(input).await.unwrap();
    assert_eq!(created.stock, 7);

    // replacing the buckets re-derives the total
    let updated = app
        .services()
        .catalog
        .update_product(
            created.id,
            UpdateProductInput {
                size_stocks: Some(SizeStocks(vec![SizeStock {
                    size: "M".to_string(),
                    stock: 10,
                }])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stock, 10);
}

#[tokio::test]
async fn nonpositive_price_is_rejected() {
    let app = setup().await;

    let err = app
        .services()
        .catalog
        .create_product(product_input("Freebie", dec!(0), 5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = app
        .services()
        .catalog
        .create_product(product_input("Refund", dec!(-10), 5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn unknown_category_reference_is_rejected() {
    let app = setup().await;

    let mut input = product_input("Shirt", dec!(300), 5);
    input.category_id = Some(Uuid::new_v4());
    let err = app.services().catalog.create_product(input).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn storefront_listing_only_shows_active_products() {
    let app = setup().await;
    let live = seed_product(&app, "live", dec!(100), 5).await;
    let hidden = app
        .services()
        .catalog
        .create_product({
            let mut input = product_input("Hidden", dec!(100), 5);
            input.status = Some(ProductStatus::Draft);
            input
        })
        .await
        .unwrap();

    let (public, total) = app
        .services()
        .catalog
        .list_products(ProductFilter::default(), false, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(public[0].id, live.id);

    let (all, total) = app
        .services()
        .catalog
        .list_products(ProductFilter::default(), true, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);

    // slug lookup follows the same visibility rule
    assert!(app
        .services()
        .catalog
        .get_product_by_slug("live")
        .await
        .is_ok());
    let err = app
        .services()
        .catalog
        .get_product_by_slug(&hidden.slug)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn listing_sorts_and_searches() {
    let app = setup().await;
    seed_product(&app, "alpha-mug", dec!(300), 5).await;
    seed_product(&app, "beta-mug", dec!(100), 5).await;
    seed_product(&app, "shirt", dec!(200), 5).await;

    let (cheapest_first, _) = app
        .services()
        .catalog
        .list_products(
            ProductFilter {
                sort: Some("price_asc".to_string()),
                ..Default::default()
            },
            false,
            1,
            20,
        )
        .await
        .unwrap();
    let prices: Vec<_> = cheapest_first.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![dec!(100), dec!(200), dec!(300)]);

    let (mugs, total) = app
        .services()
        .catalog
        .list_products(
            ProductFilter {
                q: Some("mug".to_string()),
                ..Default::default()
            },
            false,
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(mugs.iter().all(|p| p.name.contains("mug")));
}

#[tokio::test]
async fn archiving_pulls_a_product_from_the_storefront() {
    let app = setup().await;
    let shirt = seed_product(&app, "shirt", dec!(300), 5).await;

    app.services().catalog.archive_product(shirt.id).await.unwrap();

    assert_eq!(
        reload_product(&app, shirt.id).await.status,
        ProductStatus::Archived
    );
    let err = app
        .services()
        .catalog
        .get_product_by_slug("shirt")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn categories_in_use_cannot_be_deleted() {
    let app = setup().await;

    let category = app
        .services()
        .catalog
        .create_category(CreateCategoryInput {
            name: "Shirts".to_string(),
            slug: None,
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(category.slug, "shirts");

    let mut input = product_input("Oxford", dec!(700), 3);
    input.category_id = Some(category.id);
    app.services().catalog.create_product(input).await.unwrap();

    let err = app
        .services()
        .catalog
        .delete_category(category.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .services()
        .catalog
        .delete_category(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn brand_slugs_collide_like_product_slugs() {
    let app = setup().await;

    app.services()
        .catalog
        .create_brand(CreateBrandInput {
            name: "Acme".to_string(),
            slug: None,
            logo_url: None,
        })
        .await
        .unwrap();
    let err = app
        .services()
        .catalog
        .create_brand(CreateBrandInput {
            name: "ACME".to_string(),
            slug: None,
            logo_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    assert_eq!(app.services().catalog.list_brands().await.unwrap().len(), 1);
}
