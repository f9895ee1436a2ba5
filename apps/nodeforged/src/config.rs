use std::time::Duration;

/// Runtime configuration, read once at startup from the environment (via
/// `.env` in development) into one typed struct.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_connection: String,
    pub store_auth_token: Option<String>,
    pub port: u16,
    pub signing_key: String,
    /// Symmetric admin credential for admin-only operations (lock reset),
    /// checked ahead of JWT verification in `auth_guard`.
    pub admin_token: Option<String>,
    pub token_lifetime: Duration,
    pub heartbeat_live_window: Duration,
    pub lock_expiry_window: Duration,
    pub sweeper_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_connection = std::env::var("STORE_CONNECTION")
            .map_err(|_| anyhow::anyhow!("STORE_CONNECTION is not set"))?;

        let signing_key = std::env::var("AUTH_SIGNING_KEY")
            .map_err(|_| anyhow::anyhow!("AUTH_SIGNING_KEY is not set; it must come from a secret source"))?;

        Ok(Self {
            store_connection,
            store_auth_token: std::env::var("STORE_AUTH_TOKEN").ok(),
            port: env_parse("PORT", 3000),
            signing_key,
            admin_token: std::env::var("AUTH_ADMIN_TOKEN").ok(),
            token_lifetime: Duration::from_secs(env_parse("AUTH_TOKEN_LIFETIME_SECS", 24 * 3600)),
            heartbeat_live_window: Duration::from_secs(env_parse("HEARTBEAT_LIVE_WINDOW_SECS", 120)),
            lock_expiry_window: Duration::from_secs(env_parse("LOCK_EXPIRY_WINDOW_SECS", 3600)),
            sweeper_interval: Duration::from_secs(env_parse("SWEEPER_INTERVAL_SECS", 30)),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
