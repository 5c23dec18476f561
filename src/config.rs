use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Upper bound for `JWT_TTL_DAYS`; keeps `exp` well inside the timestamp range.
pub const MAX_JWT_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub upload_dir: String,
    pub pool_size: usize,
    pub max_sessions: usize,
    pub timeout_secs: u64,
    pub retries: u32,
}

impl SftpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub environment: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub sftp: SftpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "citricloud".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "citricloud-users".into()),
            ttl_days: match std::env::var("JWT_TTL_DAYS") {
                Ok(raw) => parse_ttl_days(&raw)?,
                Err(_) => 7,
            },
        };

        // Storage credentials have no defaults on purpose: they must come from the environment.
        let sftp = SftpConfig {
            host: std::env::var("HETZNER_HOST").context("HETZNER_HOST must be set")?,
            port: env_or("HETZNER_PORT", 22),
            user: std::env::var("HETZNER_USER").context("HETZNER_USER must be set")?,
            password: std::env::var("HETZNER_PASSWORD").context("HETZNER_PASSWORD must be set")?,
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "/upload".into()),
            pool_size: env_or("SFTP_POOL_SIZE", 4),
            max_sessions: env_or("SFTP_MAX_SESSIONS", 8),
            timeout_secs: env_or("SFTP_TIMEOUT_SECS", 30),
            retries: env_or("SFTP_RETRIES", 2),
        };

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("APP_PORT"))
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(4000);

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            cors_origin: std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".into()),
            environment: std::env::var("APP_ENV")
                .or_else(|_| std::env::var("NODE_ENV"))
                .unwrap_or_else(|_| "development".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data.db".into()),
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 1),
            jwt,
            sftp,
        })
    }

    /// Config used by `AppState::fake()` and the test suites.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: "*".into(),
            environment: "test".into(),
            database_url: "sqlite::memory:".into(),
            database_max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_days: 7,
            },
            sftp: SftpConfig {
                host: "127.0.0.1".into(),
                port: 22,
                user: "test".into(),
                password: "test".into(),
                upload_dir: "/upload".into(),
                pool_size: 1,
                max_sessions: 2,
                timeout_secs: 2,
                retries: 0,
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_ttl_days(raw: &str) -> anyhow::Result<i64> {
    let days: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("JWT_TTL_DAYS is not a number: {:?}", raw))?;
    anyhow::ensure!(
        (1..=MAX_JWT_TTL_DAYS).contains(&days),
        "JWT_TTL_DAYS must be between 1 and {}, got {}",
        MAX_JWT_TTL_DAYS,
        days
    );
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_garbage() {
        std::env::set_var("CITRICLOUD_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or::<u16>("CITRICLOUD_TEST_GARBAGE", 22), 22);
        assert_eq!(env_or::<u32>("CITRICLOUD_TEST_MISSING_KEY", 7), 7);

        std::env::set_var("CITRICLOUD_TEST_NUMBER", "2222");
        assert_eq!(env_or::<u16>("CITRICLOUD_TEST_NUMBER", 22), 2222);
    }

    #[test]
    fn sftp_timeout_is_seconds() {
        let cfg = AppConfig::for_tests();
        assert_eq!(cfg.sftp.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn ttl_days_must_be_in_range() {
        assert_eq!(parse_ttl_days("30").unwrap(), 30);
        assert_eq!(parse_ttl_days(" 7 ").unwrap(), 7);
        assert!(parse_ttl_days("0").is_err());
        assert!(parse_ttl_days("-3").is_err());
        assert!(parse_ttl_days("seven").is_err());
        assert!(parse_ttl_days("106751991167300").is_err());
    }
}
