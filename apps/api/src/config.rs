use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Size of the report worker pool.
    pub report_workers: usize,
    /// Max concurrently running jobs of a single report type.
    pub report_max_instances: usize,
    /// Load default countries and currencies into empty tables at startup.
    pub seed_reference_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            report_workers: 3,
            report_max_instances: 3,
            seed_reference_data: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            port: parse_env("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            report_workers: parse_env("REPORT_WORKERS", defaults.report_workers)?.max(1),
            report_max_instances: parse_env("REPORT_MAX_INSTANCES", defaults.report_max_instances)?
                .max(1),
            seed_reference_data: parse_env("SEED_REFERENCE_DATA", defaults.seed_reference_data)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_missing_uses_default() {
        let port: u16 = parse_env("TRANSIT_API_TEST_UNSET_PORT", 9090).unwrap();
        assert_eq!(port, 9090);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("TRANSIT_API_TEST_BAD_WORKERS", "three");
        let parsed: Result<usize> = parse_env("TRANSIT_API_TEST_BAD_WORKERS", 3);
        let err = parsed.unwrap_err().to_string();
        assert!(err.contains("TRANSIT_API_TEST_BAD_WORKERS"));
    }

    #[test]
    fn test_default_pool_sizes() {
        let config = Config::default();
        assert_eq!(config.report_workers, 3);
        assert_eq!(config.report_max_instances, 3);
        assert!(config.seed_reference_data);
    }
}
