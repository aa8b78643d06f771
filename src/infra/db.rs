use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

/// Connect and bring the schema up to date. Migrations are embedded at
/// compile time from ./migrations and applied on startup.
pub async fn init_db(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("could not connect to Postgres: {e}"))?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database ready");
    Ok(pool)
}
