use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel, Category, Column, Entity as Products},
        reviews::{Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult, unique_violation},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const DEFAULT_STOCK: i32 = 10;
pub const DEFAULT_IMAGE: &str = "products/default.jpg";

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .order_by_asc(Column::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::single_page(items.len());
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: i32) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::ProductNotFound(id))?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}

/// An unknown category name and a known one with no products are reported
/// the same way.
pub async fn list_by_category(
    state: &AppState,
    category: &str,
) -> AppResult<ApiResponse<ProductList>> {
    let parsed =
        Category::parse(category).ok_or_else(|| AppError::CategoryEmpty(category.to_string()))?;

    let items: Vec<Product> = Products::find()
        .filter(Column::Category.eq(parsed))
        .order_by_asc(Column::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    if items.is_empty() {
        return Err(AppError::CategoryEmpty(category.to_string()));
    }

    let meta = Meta::single_page(items.len());
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let name = validate_name(&payload.name)?;
    validate_price(payload.price)?;
    let stock = payload.stock.unwrap_or(DEFAULT_STOCK);
    validate_stock(stock)?;
    let discount = payload.discount.unwrap_or(Decimal::ZERO);
    validate_discount(discount)?;
    ensure_name_available(&state.orm, &name, None).await?;

    let slug = unique_slug(&state.orm, &name).await?;
    let product = ActiveModel {
        id: NotSet,
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(stock),
        category: Set(payload.category.unwrap_or(Category::Phone)),
        discount: Set(discount),
        image: Set(payload
            .image
            .filter(|image| !image.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string())),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(product_conflict)?;

    tracing::info!(product_id = product.id, slug = %product.slug, "product created");

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added successfully",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

/// Apply only the supplied fields. The slug stays stable across renames.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    tracing::debug!(product_id = id, ?payload, "product update requested");

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::ProductNotFound(id))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = validate_name(&name)?;
        ensure_name_available(&state.orm, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        validate_stock(stock)?;
        active.stock = Set(stock);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(discount) = payload.discount {
        validate_discount(discount)?;
        active.discount = Set(discount);
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }

    let product = active
        .update(&state.orm)
        .await
        .map_err(product_conflict)?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

/// Deleting a product also deletes every order line and review that
/// references it.
pub async fn delete_product(state: &AppState, user: &AuthUser, id: i32) -> AppResult<()> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    if Products::find_by_id(id).one(&txn).await?.is_none() {
        txn.rollback().await?;
        return Err(AppError::ProductNotFound(id));
    }

    let history = OrderItems::delete_many()
        .filter(OrderItemCol::ProductId.eq(id))
        .exec(&txn)
        .await?
        .rows_affected;
    Reviews::delete_many()
        .filter(ReviewCol::ProductId.eq(id))
        .exec(&txn)
        .await?;
    Products::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    if history > 0 {
        tracing::warn!(
            product_id = id,
            order_lines = history,
            "deleted product removed historical order lines"
        );
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id, "order_lines_removed": history }),
    )
    .await;

    Ok(())
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else collapse
/// into a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("product");
    }
    slug
}

/// `base`, then `base-1`, `base-2`, ... until no product holds it.
pub async fn unique_slug<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<String> {
    let base = slugify(name);
    let mut candidate = base.clone();
    let mut suffix = 1;
    while Products::find()
        .filter(Column::Slug.eq(candidate.as_str()))
        .count(conn)
        .await?
        > 0
    {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

async fn ensure_name_available<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> AppResult<()> {
    let mut finder = Products::find().filter(Column::Name.eq(name));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.count(conn).await? > 0 {
        return Err(name_conflict());
    }
    Ok(())
}

fn name_conflict() -> AppError {
    AppError::Conflict {
        code: "product_name_taken",
        message: "product with this name already exists.".into(),
    }
}

/// A concurrent write can take the name or slug between the check and the
/// insert; the unique index then decides.
fn product_conflict(err: DbErr) -> AppError {
    match unique_violation(&err) {
        Some(detail) if detail.contains("slug") => AppError::Conflict {
            code: "product_slug_taken",
            message: "product with this slug already exists.".into(),
        },
        Some(_) => name_conflict(),
        None => err.into(),
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name may not be blank."));
    }
    if name.chars().count() > 255 {
        return Err(AppError::validation("name must be at most 255 characters."));
    }
    Ok(name.to_string())
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::validation("price must not be negative."));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::validation(
            "price must have at most 2 decimal places.",
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::validation("stock must not be negative."));
    }
    Ok(())
}

fn validate_discount(discount: Decimal) -> AppResult<()> {
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(AppError::validation("discount must be between 0 and 100."));
    }
    if discount.normalize().scale() > 2 {
        return Err(AppError::validation(
            "discount must have at most 2 decimal places.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("iPhone 15 Pro"), "iphone-15-pro");
        assert_eq!(slugify("  USB-C   Cable__2m "), "usb-c-cable-2m");
        assert_eq!(slugify("Galaxy Tab S9+"), "galaxy-tab-s9");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify("!!!"), "product");
        assert_eq!(slugify(""), "product");
    }

    #[test]
    fn price_rules() {
        assert!(validate_price(Decimal::new(9999, 2)).is_ok());
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(1000, 3)).is_ok());
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
        assert!(validate_price(Decimal::new(1001, 3)).is_err());
    }

    #[test]
    fn discount_bounds_are_inclusive() {
        assert!(validate_discount(Decimal::ZERO).is_ok());
        assert!(validate_discount(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_discount(Decimal::new(1001, 1)).is_err());
        assert!(validate_discount(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn discount_keeps_two_decimal_places() {
        assert!(validate_discount(Decimal::new(1250, 2)).is_ok());
        assert!(validate_discount(Decimal::new(12500, 3)).is_ok());
        assert!(validate_discount(Decimal::new(12345, 3)).is_err());
    }

    #[tokio::test]
    async fn unique_index_races_map_to_conflicts() {
        let conn = crate::db::create_orm_conn("sqlite::memory:").await.unwrap();
        crate::db::create_schema(&conn).await.unwrap();

        let row = |name: &str, slug: &str| ActiveModel {
            id: NotSet,
            name: Set(name.into()),
            slug: Set(slug.into()),
            description: Set(String::new()),
            price: Set(Decimal::from(10)),
            stock: Set(DEFAULT_STOCK),
            category: Set(Category::Phone),
            discount: Set(Decimal::ZERO),
            image: Set(DEFAULT_IMAGE.into()),
            is_featured: Set(false),
            created_at: NotSet,
            updated_at: NotSet,
        };
        row("Pixel 8", "pixel-8").insert(&conn).await.unwrap();

        let err = row("Pixel 8", "pixel-8-1").insert(&conn).await.unwrap_err();
        assert!(matches!(
            product_conflict(err),
            AppError::Conflict { code: "product_name_taken", .. }
        ));

        let err = row("Pixel 8a", "pixel-8").insert(&conn).await.unwrap_err();
        assert!(matches!(
            product_conflict(err),
            AppError::Conflict { code: "product_slug_taken", .. }
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name("  Pixel 8 ").unwrap(), "Pixel 8");
    }
}
