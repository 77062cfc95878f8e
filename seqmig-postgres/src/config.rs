//! PostgreSQL connection configuration.

use std::time::Duration;

use crate::error::{PgError, PgResult};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// SSL mode for connections.
///
/// Connections are made without a TLS connector, so both modes end up as
/// plain connections. `sslmode=require` is rejected by [`PgConfig::from_url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Disable SSL.
    Disable,
    /// Prefer SSL but allow non-SSL.
    #[default]
    Prefer,
}

impl SslMode {
    fn to_pg(self) -> tokio_postgres::config::SslMode {
        match self {
            Self::Disable => tokio_postgres::config::SslMode::Disable,
            Self::Prefer => tokio_postgres::config::SslMode::Prefer,
        }
    }
}

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Host.
    pub host: String,
    /// Port (default: 5432).
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: Option<String>,
    /// SSL mode.
    pub ssl_mode: SslMode,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Application name (shown in pg_stat_activity).
    pub application_name: Option<String>,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
}

impl PgConfig {
    /// Parse a `postgres://` or `postgresql://` URL.
    ///
    /// Recognized query parameters: `sslmode`, `connect_timeout` (seconds),
    /// `application_name` and `pool_size`.
    pub fn from_url(url: impl AsRef<str>) -> PgResult<Self> {
        let parsed = url::Url::parse(url.as_ref())
            .map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;

        if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
            return Err(PgError::config(format!(
                "invalid scheme: expected 'postgresql' or 'postgres', got '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| PgError::config("missing host in URL"))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(PgError::config("missing database name in URL"));
        }

        let user = match parsed.username() {
            "" => "postgres".to_string(),
            user => user.to_string(),
        };

        let mut config = Self {
            host,
            port: parsed.port().unwrap_or(5432),
            database,
            user,
            password: parsed.password().map(String::from),
            ssl_mode: SslMode::default(),
            connect_timeout: Duration::from_secs(30),
            application_name: None,
            pool_size: DEFAULT_POOL_SIZE,
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "sslmode" => {
                    config.ssl_mode = match value.as_ref() {
                        "disable" => SslMode::Disable,
                        "prefer" => SslMode::Prefer,
                        "require" => {
                            return Err(PgError::config(
                                "sslmode=require needs a TLS connector, which is not available",
                            ));
                        }
                        other => {
                            return Err(PgError::config(format!("invalid sslmode: {}", other)));
                        }
                    };
                }
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| PgError::config("invalid connect_timeout"))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "application_name" => {
                    config.application_name = Some(value.into_owned());
                }
                "pool_size" => {
                    config.pool_size = value
                        .parse()
                        .ok()
                        .filter(|size| *size > 0)
                        .ok_or_else(|| PgError::config("invalid pool_size"))?;
                }
                other => {
                    return Err(PgError::config(format!("unknown URL parameter '{}'", other)));
                }
            }
        }

        Ok(config)
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Convert to tokio-postgres config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .ssl_mode(self.ssl_mode.to_pg())
            .connect_timeout(self.connect_timeout);

        if let Some(ref password) = self.password {
            config.password(password);
        }
        if let Some(ref app_name) = self.application_name {
            config.application_name(app_name);
        }

        config
    }
}
