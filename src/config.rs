// config.rs

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error when a required environment variable is not found
    #[error("Environment variable not found: {0}")]
    Missing(&'static str),

    /// Error when a variable is present but cannot be parsed
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub db_timeout: Duration,
    pub jwt_secret: String,
    pub public_base_url: String,
    pub invite_ttl_days: i64,
    pub create_rate_limit: u32,
    pub create_rate_window: Duration,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub notify_queue_capacity: usize,
    pub notify_max_attempts: u32,
    /// `0` disables the lapsed invite sweep.
    pub expired_retention_days: i64,
    pub sweep_interval: Duration,
    pub admin_ids: HashSet<String>,
    /// Reverse proxies in front of us that append to `X-Forwarded-For`.
    /// `0` keys rate limits on the socket peer.
    pub trusted_proxy_hops: usize,
}

fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

impl Config {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse("SMTP_PORT", get("SMTP_PORT"), 25)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
            }),
            None => None,
        };

        let invite_ttl_days: i64 = parse("INVITE_TTL_DAYS", get("INVITE_TTL_DAYS"), 7)?;
        if invite_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "INVITE_TTL_DAYS",
                value: invite_ttl_days.to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse("BIND_ADDR", get("BIND_ADDR"), SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            database_url: get("DATABASE_URL"),
            db_timeout: Duration::from_secs(parse("DB_TIMEOUT_SECS", get("DB_TIMEOUT_SECS"), 5)?),
            jwt_secret,
            public_base_url: get("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            invite_ttl_days,
            create_rate_limit: parse("CREATE_RATE_LIMIT", get("CREATE_RATE_LIMIT"), 5)?,
            create_rate_window: Duration::from_secs(parse(
                "CREATE_RATE_WINDOW_SECS",
                get("CREATE_RATE_WINDOW_SECS"),
                60,
            )?),
            smtp,
            mail_from: get("MAIL_FROM").unwrap_or_else(|| "Anemi Meets <noreply@anemimeets.local>".to_string()),
            notify_queue_capacity: parse("NOTIFY_QUEUE_CAPACITY", get("NOTIFY_QUEUE_CAPACITY"), 256)?,
            notify_max_attempts: parse("NOTIFY_MAX_ATTEMPTS", get("NOTIFY_MAX_ATTEMPTS"), 3)?,
            expired_retention_days: parse("EXPIRED_RETENTION_DAYS", get("EXPIRED_RETENTION_DAYS"), 30)?,
            sweep_interval: Duration::from_secs(parse("SWEEP_INTERVAL_SECS", get("SWEEP_INTERVAL_SECS"), 3600)?),
            admin_ids: get("ADMIN_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            trusted_proxy_hops: parse("TRUSTED_PROXY_HOPS", get("TRUSTED_PROXY_HOPS"), 0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_need_only_a_secret() {
        let config = load(&[("JWT_SECRET_KEY", "s3cret")]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.database_url.is_none());
        assert!(config.smtp.is_none());
        assert_eq!(config.invite_ttl_days, 7);
        assert_eq!(config.create_rate_limit, 5);
        assert_eq!(config.create_rate_window, Duration::from_secs(60));
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.trusted_proxy_hops, 0);
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("JWT_SECRET_KEY"))));
        assert!(matches!(
            load(&[("JWT_SECRET_KEY", "  ")]),
            Err(ConfigError::Missing("JWT_SECRET_KEY"))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("JWT_SECRET_KEY", "s"),
            ("SMTP_HOST", "mail.local"),
            ("SMTP_PORT", "2525"),
            ("ADMIN_IDS", "root, ops ,"),
            ("INVITE_TTL_DAYS", "3"),
            ("TRUSTED_PROXY_HOPS", "1"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "mail.local");
        assert_eq!(smtp.port, 2525);
        assert_eq!(config.invite_ttl_days, 3);
        assert!(config.admin_ids.contains("root") && config.admin_ids.contains("ops"));
        assert_eq!(config.admin_ids.len(), 2);
        assert_eq!(config.trusted_proxy_hops, 1);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = load(&[("JWT_SECRET_KEY", "s"), ("SMTP_HOST", "h"), ("SMTP_PORT", "abc")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SMTP_PORT", .. }));
        assert!(load(&[("JWT_SECRET_KEY", "s"), ("INVITE_TTL_DAYS", "0")]).is_err());
    }
}
