use std::env;

/// Requests-per-minute limits for the public rate limiting tiers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
            relaxed_rpm: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public site the browser lives on (checkout return URLs, CORS origin)
    pub site_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// HS256 secret of the hosted auth provider
    pub auth_jwt_secret: Option<String>,
    pub auth_jwt_audience: String,
    pub checkout_currency: String,
    pub referral_commission_percent: u32,
    pub rate_limit: RateLimitConfig,
    pub checkout_session_retention_days: i64,
    pub webhook_event_retention_days: i64,
    pub dev_mode: bool,
}

/// Read an env var and parse it, falling back to `default` when unset or invalid.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read an env var, treating empty values as unset.
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("COURSEPAY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm).max(1),
            standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm).max(1),
            relaxed_rpm: env_parse("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm).max(1),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "coursepay.db".to_string()),
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            auth_jwt_secret: env_opt("AUTH_JWT_SECRET"),
            auth_jwt_audience: env::var("AUTH_JWT_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".to_string()),
            checkout_currency: env::var("CHECKOUT_CURRENCY")
                .unwrap_or_else(|_| "usd".to_string())
                .to_lowercase(),
            referral_commission_percent: env_parse("REFERRAL_COMMISSION_PERCENT", 10).min(100),
            rate_limit,
            checkout_session_retention_days: env_parse("CHECKOUT_SESSION_RETENTION_DAYS", 7),
            webhook_event_retention_days: env_parse("WEBHOOK_EVENT_RETENTION_DAYS", 30),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
