use serde::Deserialize;

const PLACEHOLDER_JWT_SECRET: &str = "CHANGE_ME_SKILLSWAP_JWT_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// When unset the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub otp_ttl_secs: i64,
    pub max_message_len: usize,
    /// Comma-separated list of webhook URLs mirroring notification events.
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<String>,
    /// Read notifications older than this are purged by the cleanup job.
    pub notification_retention_days: i64,
    pub dashboard_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            jwt_secret: PLACEHOLDER_JWT_SECRET.into(),
            otp_ttl_secs: 600,
            max_message_len: 500,
            webhook_urls: Vec::new(),
            webhook_secret: None,
            notification_retention_days: 30,
            dashboard_origin: None,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup (the process environment in production).
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let jwt_secret = get("SKILLSWAP_JWT_SECRET")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_JWT_SECRET.into());

    if jwt_secret == PLACEHOLDER_JWT_SECRET {
        let env_mode = get("SKILLSWAP_ENV")
            .or_else(|| get("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "SKILLSWAP_JWT_SECRET is still the insecure placeholder. \
                 Set a proper secret before running in production."
            );
        }
        eprintln!("⚠️  SKILLSWAP_JWT_SECRET is not set, using insecure placeholder.");
    }

    Ok(Config {
        port: get("SKILLSWAP_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port),
        database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
        jwt_secret,
        otp_ttl_secs: get("SKILLSWAP_OTP_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.otp_ttl_secs),
        max_message_len: get("SKILLSWAP_MAX_MESSAGE_LEN")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_message_len),
        webhook_urls: get("SKILLSWAP_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: get("SKILLSWAP_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        notification_retention_days: get("SKILLSWAP_NOTIFICATION_RETENTION_DAYS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.notification_retention_days),
        dashboard_origin: get("DASHBOARD_ORIGIN").filter(|s| !s.is_empty()),
    })
}
