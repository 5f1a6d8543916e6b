use aiyou_core::error::CoreError;

/// Server configuration loaded from environment variables.
///
/// Pipeline tuning (poll interval, timeouts, planner bound) lives in
/// [`aiyou_pipeline::PipelineConfig`]; this struct only covers the HTTP side.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// SQLite database URL.
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            database_url: "sqlite://aiyou.db".into(),
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `127.0.0.1`                |
    /// | `PORT`                 | `3001`                     |
    /// | `DATABASE_URL`         | `sqlite://aiyou.db`        |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let host = std::env::var("HOST").unwrap_or(defaults.host);
        let port = parse_var("PORT", defaults.port)?;
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(raw) => split_origins(&raw),
            Err(_) => defaults.cors_origins,
        };

        let request_timeout_secs =
            parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;
        if request_timeout_secs == 0 {
            return Err(CoreError::Validation(
                "REQUEST_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }

        Ok(Self {
            host,
            port,
            database_url,
            cors_origins,
            request_timeout_secs,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} must be a valid number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(
            split_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test", "http://b.test"]
        );
    }

    #[test]
    fn defaults_bind_locally() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3001);
    }
}
