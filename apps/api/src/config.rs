use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Panics at startup if required variables are missing.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Serve the fixed demo dataset from the read model instead of querying
    /// the job table. Explicit degraded mode for unconfigured deployments.
    pub demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_pool_size(
                std::env::var("DB_MAX_CONNECTIONS").ok().as_deref(),
            )?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            demo_data: std::env::var("DEMO_DATA")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_pool_size(value: Option<&str>) -> Result<u32> {
    match value {
        None => Ok(DEFAULT_DB_MAX_CONNECTIONS),
        Some(v) => {
            let n = v
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?;
            anyhow::ensure!(n > 0, "DB_MAX_CONNECTIONS must be at least 1");
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_defaults_when_unset() {
        assert_eq!(parse_pool_size(None).unwrap(), DEFAULT_DB_MAX_CONNECTIONS);
    }

    #[test]
    fn test_pool_size_parses_explicit_value() {
        assert_eq!(parse_pool_size(Some("25")).unwrap(), 25);
    }

    #[test]
    fn test_pool_size_rejects_garbage() {
        assert!(parse_pool_size(Some("plenty")).is_err());
    }

    #[test]
    fn test_pool_size_rejects_zero() {
        assert!(parse_pool_size(Some("0")).is_err());
    }
}
