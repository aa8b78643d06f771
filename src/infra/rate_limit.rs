use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};
use crate::domain::entities::identity::normalize_email;

/// Throttling for the client-facing endpoints. The entitlement verify
/// endpoint gets polled on a timer after checkout, so limits are enforced
/// per caller IP and, when known, per email.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub window_secs: u64,
    pub per_ip: u64,
    pub per_email: u64,
}

/// One counter per key per window. The script keeps INCR and EXPIRE atomic
/// and re-arms a counter that somehow lost its TTL.
const COUNTER_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
if hits == 1 or redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return hits
"#;

/// Counters live in Redis so the limits hold across processes.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    limits: RateLimits,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str, limits: RateLimits) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            limits,
            script: Script::new(COUNTER_SCRIPT),
        })
    }

    async fn hit(&self, conn: &mut ConnectionManager, key: String, limit: u64) -> AppResult<()> {
        let hits: u64 = self
            .script
            .key(key)
            .arg(self.limits.window_secs)
            .invoke_async(conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if hits > limit {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        self.hit(&mut conn, format!("throttle:ip:{ip}"), self.limits.per_ip)
            .await?;

        if let Some(email) = email {
            let key = format!("throttle:email:{}", normalize_email(email));
            self.hit(&mut conn, key, self.limits.per_email).await?;
        }
        Ok(())
    }
}
