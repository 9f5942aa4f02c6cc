use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub concurrency_limit: usize,
    pub body_limit_bytes: usize,
    pub cors_allow_all: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT").unwrap_or(3000);
        let concurrency_limit = parse_var("CONCURRENCY_LIMIT").unwrap_or(100);
        let body_limit_bytes = parse_var("BODY_LIMIT_BYTES").unwrap_or(1024 * 1024);
        let cors_allow_all = env::var("CORS_ALLOW_ALL")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);
        Ok(Self {
            port,
            database_url,
            host,
            concurrency_limit,
            body_limit_bytes,
            cors_allow_all,
        })
    }

    /// Settings for an in-process app, used by the test suite.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 0,
            concurrency_limit: 100,
            body_limit_bytes: 1024 * 1024,
            cors_allow_all: true,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" On "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
