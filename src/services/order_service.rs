use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, CreateOrderResponse, OrderLineRequest},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Entity as Orders, Model as OrderModel, OrderStatus,
            PaymentStatus,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const GUEST_NAME: &str = "Guest";

/// Inputs the customer snapshot fields are resolved from.
pub struct CustomerContext<'a> {
    pub request: &'a CreateOrderRequest,
    pub user: Option<&'a AuthUser>,
}

pub type FieldResolver = fn(&CustomerContext<'_>) -> Option<String>;

fn requested_name(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.request.customer_name.clone()
}

fn profile_full_name(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.user.and_then(|u| u.full_name.clone())
}

fn profile_username(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.user.map(|u| u.username.clone())
}

fn requested_email(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.request.customer_email.clone()
}

fn profile_email(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.user.map(|u| u.email.clone())
}

fn legacy_email(ctx: &CustomerContext<'_>) -> Option<String> {
    ctx.request.email.clone()
}

/// Tried in order; the first non-blank value wins.
pub const NAME_RESOLVERS: &[FieldResolver] = &[requested_name, profile_full_name, profile_username];

pub const EMAIL_RESOLVERS: &[FieldResolver] = &[requested_email, profile_email, legacy_email];

pub fn resolve_field(ctx: &CustomerContext<'_>, resolvers: &[FieldResolver]) -> Option<String> {
    resolvers
        .iter()
        .filter_map(|resolve| resolve(ctx))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

pub fn order_total(items: &[OrderItemModel]) -> Decimal {
    items.iter().map(OrderItemModel::line_total).sum()
}

/// Place an order for `user` (or a guest). The order row, every line and
/// every stock decrement commit together or not at all.
pub async fn create_order(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    if let Some(line) = payload.items.iter().find(|line| line.quantity <= 0) {
        return Err(AppError::validation(format!(
            "Quantity for product {} must be at least 1",
            line.id
        )));
    }

    let ctx = CustomerContext {
        request: &payload,
        user,
    };
    let customer_name =
        resolve_field(&ctx, NAME_RESOLVERS).unwrap_or_else(|| GUEST_NAME.to_string());
    let customer_email = resolve_field(&ctx, EMAIL_RESOLVERS).unwrap_or_default();
    let customer_address = payload.customer_address.clone();

    tracing::info!(
        lines = payload.items.len(),
        customer = %customer_name,
        authenticated = user.is_some(),
        "placing order"
    );

    let txn = state.orm.begin().await?;
    let placed = place_order(
        &txn,
        user.map(|u| u.user_id),
        customer_name,
        customer_email,
        customer_address,
        &payload.items,
    )
    .await;

    let order = match placed {
        Ok(order) => {
            txn.commit().await?;
            order
        }
        Err(err) => {
            txn.rollback().await?;
            tracing::warn!(error = %err, "order rolled back");
            return Err(err);
        }
    };

    tracing::info!(
        order_id = order.id,
        total = %order.total_price,
        email = %order.customer_email,
        "order placed"
    );

    audit::record(
        &state.orm,
        order.customer_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed successfully!",
        CreateOrderResponse {
            order_id: order.id,
            customer_email: order.customer_email,
            customer_address: order.customer_address,
        },
        Some(Meta::empty()),
    ))
}

async fn place_order(
    txn: &DatabaseTransaction,
    customer_id: Option<i32>,
    customer_name: String,
    customer_email: String,
    customer_address: Option<String>,
    lines: &[OrderLineRequest],
) -> AppResult<OrderModel> {
    let order = OrderActive {
        id: NotSet,
        customer_id: Set(customer_id),
        customer_name: Set(customer_name),
        customer_email: Set(customer_email),
        customer_address: Set(customer_address),
        total_price: Set(Decimal::ZERO),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    for line in lines {
        place_line(txn, order.id, line).await?;
    }

    refresh_total_price(txn, order.id).await
}

/// Snapshot the product, take the stock and persist the line. The decrement
/// only applies while enough stock remains, so concurrent orders cannot drive
/// it negative.
async fn place_line<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    line: &OrderLineRequest,
) -> AppResult<OrderItemModel> {
    let product = Products::find_by_id(line.id)
        .one(conn)
        .await?
        .ok_or(AppError::ProductNotFound(line.id))?;

    let unit_price = product.discounted_price();

    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let taken = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
        .col_expr(ProdCol::UpdatedAt, Expr::value(now))
        .filter(ProdCol::Id.eq(product.id))
        .filter(ProdCol::Stock.gte(line.quantity))
        .exec(conn)
        .await?;

    if taken.rows_affected == 0 {
        return Err(AppError::InsufficientStock {
            product: product.name,
            requested: line.quantity,
            available: product.stock,
        });
    }

    let item = OrderItemActive {
        id: NotSet,
        order_id: Set(order_id),
        product_id: Set(product.id),
        product_name: Set(product.name),
        quantity: Set(line.quantity),
        price: Set(unit_price),
    }
    .insert(conn)
    .await?;

    tracing::debug!(
        order_id,
        product_id = item.product_id,
        quantity = item.quantity,
        price = %item.price,
        "order line placed"
    );

    Ok(item)
}

/// Recompute `total_price` from the persisted lines.
pub async fn refresh_total_price<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or(AppError::OrderNotFound(order_id))?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;

    let mut active: OrderActive = order.into();
    active.total_price = Set(order_total(&items));
    Ok(active.update(conn).await?)
}
