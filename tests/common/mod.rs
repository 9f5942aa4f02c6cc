#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::{
    db::{create_orm_conn, create_schema},
    dto::auth::RegisterRequest,
    entity::{
        products::{self, ActiveModel as ProductActive, Category},
        users::{self, Entity as Users, Role},
    },
    middleware::auth::AuthUser,
    services::auth_service,
    state::AppState,
};

pub const PASSWORD: &str = "hunter22";

/// Fresh state backed by an in-memory SQLite database unless
/// `TEST_DATABASE_URL` points somewhere else.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let database_url =
        std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let orm = create_orm_conn(&database_url).await?;
    create_schema(&orm).await?;
    Ok(AppState::new(orm))
}

pub async fn create_user(
    state: &AppState,
    username: &str,
    email: &str,
    role: Role,
) -> anyhow::Result<users::Model> {
    let created = auth_service::register_user(
        state,
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: PASSWORD.into(),
        },
    )
    .await?;
    let id = created.data.expect("registered user").id;

    let user = match role {
        Role::User => Users::find_by_id(id)
            .one(&state.orm)
            .await?
            .expect("user row"),
        Role::Admin => auth_service::assign_role(&state.orm, id, Role::Admin).await?,
    };
    Ok(user)
}

pub async fn auth_user(
    state: &AppState,
    username: &str,
    email: &str,
    role: Role,
) -> anyhow::Result<AuthUser> {
    let user = create_user(state, username, email, role).await?;
    Ok(AuthUser::from(&user))
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    discount: i64,
    stock: i32,
) -> anyhow::Result<products::Model> {
    let product = ProductActive {
        id: NotSet,
        name: Set(name.into()),
        slug: Set(storefront_api::services::product_service::slugify(name)),
        description: Set(format!("{name} for testing")),
        price: Set(Decimal::from(price)),
        stock: Set(stock),
        category: Set(Category::Phone),
        discount: Set(Decimal::from(discount)),
        image: Set("products/default.jpg".into()),
        is_featured: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn product_stock(state: &AppState, id: i32) -> anyhow::Result<i32> {
    let product = products::Entity::find_by_id(id)
        .one(&state.orm)
        .await?
        .expect("product row");
    Ok(product.stock)
}
