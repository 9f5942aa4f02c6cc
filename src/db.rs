use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema,
    sea_query::TableCreateStatement,
};
use sqlx::postgres::PgPoolOptions;

use crate::entity::{AuditLogs, AuthTokens, OrderItems, Orders, Products, Reviews, Users};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Plain sqlx pool, used for migrations and seeding.
pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url);
    // Every pooled connection to an in-memory SQLite URL opens a separate,
    // empty database.
    if is_in_memory_sqlite(database_url) {
        options.max_connections(1).min_connections(1);
    }
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Build every table from the entity definitions, parents first. Used for
/// SQLite databases; Postgres deployments run the SQL files in `migrations/`.
pub async fn create_schema(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements: Vec<TableCreateStatement> = vec![
        schema.create_table_from_entity(Users),
        schema.create_table_from_entity(AuthTokens),
        schema.create_table_from_entity(Products),
        schema.create_table_from_entity(Orders),
        schema.create_table_from_entity(OrderItems),
        schema.create_table_from_entity(Reviews),
        schema.create_table_from_entity(AuditLogs),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        conn.execute(backend.build(&*statement)).await?;
    }

    tracing::debug!(tables = statements.len(), "schema ensured");
    Ok(())
}

fn is_in_memory_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite") && database_url.contains(":memory:")
}
