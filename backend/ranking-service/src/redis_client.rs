use crate::config::RedisConfig;
use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

pub async fn connect(config: &RedisConfig) -> Result<SharedRedis> {
    let client =
        redis::Client::open(config.url.as_str()).context("failed to construct Redis client")?;
    let manager = ConnectionManager::new(client)
        .await
        .context("failed to initialize Redis connection manager")?;

    info!("Redis connection manager ready");
    Ok(Arc::new(Mutex::new(manager)))
}
