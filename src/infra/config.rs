use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::infra::rate_limit::RateLimits;

pub struct AppConfig {
    pub jwt_secret: SecretString,
    /// Shared secret the payment provider signs webhook bodies with.
    pub webhook_secret: SecretString,
    /// The provider's hosted checkout page; identity hints are appended as
    /// query parameters at redirect time.
    pub checkout_base_url: Url,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub rate_limits: RateLimits,
    /// Trust X-Forwarded-For / X-Real-IP. Only behind a reverse proxy that
    /// strips client-supplied values.
    pub trust_proxy: bool,
    /// Ceiling on store writes while applying a webhook; hitting it returns
    /// 500 so the provider redelivers instead of timing the delivery out.
    pub webhook_apply_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: SecretString::new(get_env::<String>("JWT_SECRET").into()),
            webhook_secret: SecretString::new(get_env::<String>("WEBHOOK_SECRET").into()),
            checkout_base_url: get_env("CHECKOUT_BASE_URL"),
            cors_origin: get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value"),
            bind_addr: get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap()),
            database_url: get_env("DATABASE_URL"),
            redis_url: get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string()),
            rate_limits: RateLimits {
                window_secs: get_env_default("RATE_LIMIT_WINDOW_SECS", 60),
                per_ip: get_env_default("RATE_LIMIT_PER_IP", 60),
                per_email: get_env_default("RATE_LIMIT_PER_EMAIL", 30),
            },
            trust_proxy: get_env_default("TRUST_PROXY", false),
            webhook_apply_timeout: Duration::from_millis(get_env_default(
                "WEBHOOK_APPLY_TIMEOUT_MS",
                5_000,
            )),
        }
    }
}
