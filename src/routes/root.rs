use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(api_root))
}

#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "Available endpoints", body = ApiResponse<serde_json::Value>),
    ),
    tag = "Health"
)]
pub async fn api_root() -> Json<ApiResponse<Value>> {
    let routes = json!({
        "products": "/api/products/",
        "product": "/api/products/<product_id>/",
        "products_by_category": "/api/products/category/<category_name>/",
        "product_reviews": "/api/products/<product_id>/reviews/",
        "register": "/api/auth/register/",
        "login": "/api/auth/login/",
        "logout": "/api/auth/logout/",
        "create_order": "/api/orders/create/",
        "admin_login": "/api/admin/login/",
        "add_product": "/api/admin/products/add/",
        "update_product": "/api/admin/products/update/<product_id>/",
        "delete_product": "/api/admin/products/delete/<product_id>/",
        "orders": "/api/admin/orders/",
        "order": "/api/admin/orders/<order_id>/",
        "update_order_status": "/api/admin/orders/update/<order_id>/",
    });
    Json(ApiResponse::success("API root", routes, Some(Meta::empty())))
}
