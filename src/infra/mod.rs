use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod rate_limit;
pub mod setup;
pub mod webhook_signature;

pub use rate_limit::RateLimiterTrait;

#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("Redis connection failed: {0}")]
    RedisConnection(#[from] redis::RedisError),
}

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
