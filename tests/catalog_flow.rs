mod common;

use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    dto::{
        orders::{CreateOrderRequest, OrderLineRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        reviews::CreateReviewRequest,
    },
    entity::{OrderItems, Orders, Products, products::Category, users::Role},
    error::AppError,
    services::{order_service, product_service, review_service},
};

use common::{auth_user, create_product, setup_state};

fn new_product(name: &str, price: i64) -> CreateProductRequest {
    CreateProductRequest {
        name: name.into(),
        description: String::new(),
        price: Decimal::from(price),
        stock: None,
        category: None,
        discount: None,
        image: None,
        is_featured: None,
    }
}

#[tokio::test]
async fn created_products_get_defaults_and_unique_slugs() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = auth_user(&state, "boss", "boss@example.com", Role::Admin).await?;

    let first = product_service::create_product(&state, &admin, new_product("Galaxy Tab", 300))
        .await?
        .data
        .expect("product");
    assert_eq!(first.slug, "galaxy-tab");
    assert_eq!(first.stock, product_service::DEFAULT_STOCK);
    assert_eq!(first.image, product_service::DEFAULT_IMAGE);
    assert_eq!(first.category, Category::Phone);
    assert_eq!(first.discounted_price, Decimal::from(300));

    let second = product_service::create_product(&state, &admin, new_product("Galaxy  Tab", 310))
        .await?
        .data
        .expect("product");
    assert_eq!(second.slug, "galaxy-tab-1");

    let third = product_service::create_product(&state, &admin, new_product("galaxy-tab", 320))
        .await?
        .data
        .expect("product");
    assert_eq!(third.slug, "galaxy-tab-2");

    let err = product_service::create_product(&state, &admin, new_product("Galaxy Tab", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { code: "product_name_taken", .. }));
    Ok(())
}

#[tokio::test]
async fn invalid_product_fields_are_rejected() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = auth_user(&state, "boss", "boss@example.com", Role::Admin).await?;

    let err = product_service::create_product(&state, &admin, new_product("   ", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::create_product(&state, &admin, new_product("Broken", -1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            stock: Some(-3),
            ..new_product("Broken", 10)
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            discount: Some(Decimal::from(101)),
            ..new_product("Broken", 10)
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(Products::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn partial_update_keeps_untouched_fields() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = auth_user(&state, "boss", "boss@example.com", Role::Admin).await?;
    let product = create_product(&state, "Pixel 8", 100, 10, 10).await?;

    let updated = product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            stock: Some(42),
            name: Some("Pixel 8 Pro".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(updated.stock, 42);
    assert_eq!(updated.name, "Pixel 8 Pro");
    assert_eq!(updated.slug, product.slug);
    assert_eq!(updated.price, Decimal::from(100));
    assert_eq!(updated.discount, Decimal::from(10));
    assert_eq!(updated.discounted_price, Decimal::from(90));

    let err = product_service::update_product(
        &state,
        &admin,
        9999,
        UpdateProductRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound(9999)));
    Ok(())
}

#[tokio::test]
async fn catalog_mutations_require_elevated_access() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let shopper = auth_user(&state, "grace", "grace@example.com", Role::User).await?;
    let product = create_product(&state, "Pixel 8", 100, 0, 10).await?;

    let err = product_service::create_product(&state, &shopper, new_product("Nope", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = product_service::update_product(
        &state,
        &shopper,
        product.id,
        UpdateProductRequest {
            stock: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = product_service::delete_product(&state, &shopper, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    assert_eq!(Products::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn category_listing_reports_empty_and_unknown_alike() -> anyhow::Result<()> {
    let state = setup_state().await?;
    create_product(&state, "Pixel 8", 100, 0, 10).await?;

    let phones = product_service::list_by_category(&state, "phone")
        .await?
        .data
        .expect("products");
    assert_eq!(phones.items.len(), 1);

    let err = product_service::list_by_category(&state, "laptop")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CategoryEmpty(_)));
    assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);

    let err = product_service::list_by_category(&state, "toaster")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CategoryEmpty(_)));
    Ok(())
}

#[tokio::test]
async fn deleting_a_product_removes_its_order_lines() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = auth_user(&state, "boss", "boss@example.com", Role::Admin).await?;
    let phone = create_product(&state, "Pixel 8", 100, 0, 10).await?;
    let charger = create_product(&state, "USB-C Charger", 20, 0, 10).await?;

    order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            items: vec![
                OrderLineRequest {
                    id: phone.id,
                    quantity: 1,
                },
                OrderLineRequest {
                    id: charger.id,
                    quantity: 1,
                },
            ],
            ..Default::default()
        },
    )
    .await?;

    product_service::delete_product(&state, &admin, phone.id).await?;

    assert!(Products::find_by_id(phone.id).one(&state.orm).await?.is_none());
    assert_eq!(OrderItems::find().count(&state.orm).await?, 1);
    assert_eq!(Orders::find().count(&state.orm).await?, 1);

    let err = product_service::delete_product(&state, &admin, phone.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn reviews_are_validated_and_listed() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let reviewer = auth_user(&state, "grace", "grace@example.com", Role::User).await?;
    let product = create_product(&state, "Pixel 8", 100, 0, 10).await?;

    let review = review_service::create_review(
        &state,
        &reviewer,
        product.id,
        CreateReviewRequest {
            rating: 5,
            comment: Some("  Great phone  ".into()),
        },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.comment.as_deref(), Some("Great phone"));
    assert_eq!(review.user_id, reviewer.user_id);

    for rating in [0, 6] {
        let err = review_service::create_review(
            &state,
            &reviewer,
            product.id,
            CreateReviewRequest {
                rating,
                comment: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    let err = review_service::create_review(
        &state,
        &reviewer,
        9999,
        CreateReviewRequest {
            rating: 4,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound(9999)));

    let listed = review_service::list_reviews(&state, product.id)
        .await?
        .data
        .expect("reviews");
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].rating, 5);
    Ok(())
}
