// src/config.rs

use std::{env, path::PathBuf};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub media_root: PathBuf,
    /// Bootstrap admin, created on startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Reads configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://stayease.db?mode=rwc".into()),
            port: var_or("PORT", 8080),
            jwt_secret,
            access_ttl_minutes: var_or("ACCESS_TOKEN_TTL_MINUTES", 60),
            refresh_ttl_days: var_or("REFRESH_TOKEN_TTL_DAYS", 7),
            media_root: env::var("MEDIA_ROOT").map(PathBuf::from).unwrap_or_else(|_| "media".into()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
        })
    }
}
