use std::path::PathBuf;

use anyhow::{Context, bail};

use tubeway_api::auth::TokenConfig;

/// Secrets that ship in example `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    /// Base URL media links are built from.
    pub public_url: String,
    pub cors_origin: Option<String>,
    pub tokens: TokenConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string());

        let host = var("TUBEWAY_HOST", "0.0.0.0");
        let port: u16 = var("TUBEWAY_PORT", "8000")
            .parse()
            .context("TUBEWAY_PORT must be a port number")?;
        let public_url = get("TUBEWAY_PUBLIC_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let tokens = TokenConfig {
            access_secret: secret(&get, "ACCESS_TOKEN_SECRET")?,
            access_ttl_secs: var("ACCESS_TOKEN_EXPIRY_SECS", "86400")
                .parse()
                .context("ACCESS_TOKEN_EXPIRY_SECS must be a number of seconds")?,
            refresh_secret: secret(&get, "REFRESH_TOKEN_SECRET")?,
            refresh_ttl_secs: var("REFRESH_TOKEN_EXPIRY_SECS", "864000")
                .parse()
                .context("REFRESH_TOKEN_EXPIRY_SECS must be a number of seconds")?,
        };
        if tokens.access_secret == tokens.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        Ok(Self {
            host,
            port,
            db_path: var("TUBEWAY_DB_PATH", "tubeway.db").into(),
            media_dir: var("TUBEWAY_MEDIA_DIR", "./media").into(),
            public_url,
            cors_origin: get("TUBEWAY_CORS_ORIGIN").filter(|v| !v.is_empty()),
            tokens,
        })
    }
}

fn secret(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    match get(key) {
        Some(value) if !value.is_empty() && !PLACEHOLDER_SECRETS.contains(&value.as_str()) => Ok(value),
        _ => bail!("{} is unset or still a placeholder; set it in your .env file", key),
    }
}
