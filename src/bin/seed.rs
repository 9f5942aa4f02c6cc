use rust_decimal::Decimal;
use storefront_api::{
    config::AppConfig,
    db::create_pool,
    entity::{products::Category, users::{Role, elevated_access}},
    services::{auth_service::hash_password, product_service::slugify},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&pool, "user", "user@example.com", "user123", Role::User).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<i32> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let role_name = match role {
        Role::Admin => "admin",
        Role::User => "user",
    };

    let (user_id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, role, is_staff)
        VALUES ($1, $2, '', '', $3, $4, $5)
        ON CONFLICT (username) DO UPDATE
            SET role = EXCLUDED.role, is_staff = EXCLUDED.is_staff
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role_name)
    .bind(elevated_access(role))
    .fetch_one(pool)
    .await?;

    println!("Ensured user {username} (role={role_name})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Pixel 8", "Google flagship phone", Decimal::new(69900, 2), 25, Category::Phone, Decimal::ZERO),
        ("ThinkPad X1 Carbon", "Lightweight business laptop", Decimal::new(149900, 2), 10, Category::Laptop, Decimal::new(10, 0)),
        ("iPad Air", "10.9-inch tablet", Decimal::new(59900, 2), 15, Category::Tablet, Decimal::new(5, 0)),
        ("USB-C Charger 65W", "GaN wall charger", Decimal::new(3999, 2), 100, Category::Accessory, Decimal::ZERO),
    ];

    for (name, desc, price, stock, category, discount) in products {
        sqlx::query(
            r#"
            INSERT INTO products (name, slug, description, price, stock, category, discount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(slugify(name))
        .bind(desc)
        .bind(price)
        .bind(stock)
        .bind(category.as_str())
        .bind(discount)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
