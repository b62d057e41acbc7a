use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Placeholder secret used when PARLEY_JWT_SECRET is unset. Fine for local
/// development only.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Ten years. Keeps `now + ttl` far from chrono's range limits.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PARLEY_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let db_path: PathBuf = std::env::var("PARLEY_DB_PATH")
            .unwrap_or_else(|_| "parley.db".into())
            .into();
        let token_ttl = parse_token_ttl(
            &std::env::var("PARLEY_TOKEN_TTL_DAYS").unwrap_or_else(|_| "30".into()),
        )?;

        let jwt_secret = match std::env::var("PARLEY_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("PARLEY_JWT_SECRET is unset; using the development placeholder");
                DEV_JWT_SECRET.to_string()
            }
        };
        if jwt_secret == DEV_JWT_SECRET {
            warn!("Tokens are signed with a placeholder secret. Do not run like this in production.");
        }

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            token_ttl,
        })
    }
}

/// Token lifetime in whole days. Must be positive and representable.
fn parse_token_ttl(raw: &str) -> anyhow::Result<chrono::Duration> {
    let days: i64 = raw
        .trim()
        .parse()
        .context("PARLEY_TOKEN_TTL_DAYS must be a whole number of days")?;
    if !(1..=MAX_TOKEN_TTL_DAYS).contains(&days) {
        anyhow::bail!(
            "PARLEY_TOKEN_TTL_DAYS must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_DAYS,
            days
        );
    }
    chrono::Duration::try_days(days)
        .with_context(|| format!("PARLEY_TOKEN_TTL_DAYS is out of range: {}", days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_must_be_positive_and_in_range() {
        assert_eq!(parse_token_ttl("30").unwrap(), chrono::Duration::days(30));
        assert_eq!(parse_token_ttl(" 7 ").unwrap(), chrono::Duration::days(7));

        assert!(parse_token_ttl("0").is_err());
        assert!(parse_token_ttl("-5").is_err());
        assert!(parse_token_ttl("soon").is_err());
        assert!(parse_token_ttl("100000").is_err());
        assert!(parse_token_ttl(&i64::MAX.to_string()).is_err());
    }
}
