use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AdminLoginRequest, LoginRequest, LoginResponse, RegisterRequest},
        orders::{
            AdminOrderList, CreateOrderRequest, CreateOrderResponse, OrderLineRequest,
            OrderWithItems, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
    },
    entity::{
        orders::{OrderStatus, PaymentStatus},
        products::Category,
        users::Role,
    },
    models::{Order, OrderItem, Product, Review, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, health, orders, params, products, root},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "token_auth",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "Authorization",
                "Token <key> as returned by /api/auth/login",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        root::api_root,
        auth::register,
        auth::login,
        auth::logout,
        products::list_products,
        products::get_product,
        products::list_by_category,
        products::list_reviews,
        products::create_review,
        orders::create_order,
        admin::admin_login,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::create_product,
        admin::update_product,
        admin::delete_product
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            Category,
            Order,
            OrderStatus,
            PaymentStatus,
            OrderItem,
            Review,
            RegisterRequest,
            LoginRequest,
            AdminLoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            OrderLineRequest,
            CreateOrderResponse,
            UpdateOrderStatusRequest,
            OrderWithItems,
            AdminOrderList,
            CreateReviewRequest,
            ReviewList,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderWithItems>,
            ApiResponse<AdminOrderList>,
            ApiResponse<CreateOrderResponse>,
            ApiResponse<LoginResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check and route map"),
        (name = "Products", description = "Catalog and review endpoints"),
        (name = "Orders", description = "Order placement"),
        (name = "Admin", description = "Catalog and order administration"),
        (name = "Auth", description = "Registration and token endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
