use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod root;

// Build the API router without binding state; it will be provided at the top level.
// Paths are declared without a trailing slash; the app trims it before routing.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(root::router())
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/orders", orders::router())
        .nest("/admin", admin::router())
}
