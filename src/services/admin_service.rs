use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::{
    audit,
    dto::orders::{AdminOrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        OrderItems,
        order_items::Column as OrderItemCol,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::InvalidStatus(status.clone()))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt).order_by_asc(OrderCol::Id),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt).order_by_desc(OrderCol::Id),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = orders.load_many(OrderItems, &state.orm).await?;

    let orders = orders
        .into_iter()
        .zip(items)
        .map(|(order, items)| {
            OrderWithItems::new(
                Order::from(order),
                items.into_iter().map(OrderItem::from).collect(),
            )
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList {
            orders,
            count: total,
        },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::OrderNotFound(id))?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems::new(Order::from(order), items),
        Some(Meta::empty()),
    ))
}

/// Move an order into one of the admin-settable statuses. Only `status`
/// changes; totals and lines are untouched.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::OrderNotFound(id))?;

    let status = OrderStatus::parse_admin_settable(&payload.status)
        .ok_or_else(|| AppError::InvalidStatus(payload.status.clone()))?;

    let previous = existing.status;
    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    let order = active.update(&state.orm).await?;

    tracing::info!(
        order_id = order.id,
        from = previous.as_str(),
        to = status.as_str(),
        "order status updated"
    );

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": status.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated successfully",
        Order::from(order),
        Some(Meta::empty()),
    ))
}
