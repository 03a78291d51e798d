//! Process configuration read from environment variables.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

/// Origin always allowed by CORS, for local frontend development.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error(
        "no database configuration found; set DATABASE_URL, POSTGRES_DSN, or \
         DATABASE_HOST/DATABASE_USER/DATABASE_PASSWORD/DATABASE_NAME"
    )]
    NoDatabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    /// Mirror any request origin instead of using the list
    pub allow_all: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub source: DatabaseSource,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

/// Where the connection parameters came from.
///
/// Resolution order is fixed: `DATABASE_URL`, then `POSTGRES_DSN`, then the
/// discrete `DATABASE_*` fields.
#[derive(Clone)]
pub enum DatabaseSource {
    Url(String),
    Discrete {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
    },
}

impl DatabaseSource {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match self {
            DatabaseSource::Url(url) => PgConnectOptions::from_str(url),
            DatabaseSource::Discrete {
                host,
                port,
                user,
                password,
                name,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(name)
                .ssl_mode(PgSslMode::Require)),
        }
    }

    /// Human-readable form with the password masked, safe to log.
    pub fn describe(&self) -> String {
        match self {
            DatabaseSource::Url(url) => mask_url_credentials(url),
            DatabaseSource::Discrete {
                host, port, user, name, ..
            } => format!("host={host} port={port} user={user} dbname={name} sslmode=require"),
        }
    }
}

impl std::fmt::Debug for DatabaseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Replaces the userinfo part of a connection URL with `***`.
fn mask_url_credentials(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let server = ServerConfig {
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8080)?,
        };

        let database = DatabaseConfig {
            source: database_source(&get)?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 25)?,
            min_connections: parse_or("DATABASE_MIN_CONNECTIONS", get("DATABASE_MIN_CONNECTIONS"), 5)?,
            connect_attempts: parse_or("DATABASE_CONNECT_ATTEMPTS", get("DATABASE_CONNECT_ATTEMPTS"), 5)?
                .max(1),
            retry_delay: Duration::from_secs(parse_or(
                "DATABASE_RETRY_DELAY_SECS",
                get("DATABASE_RETRY_DELAY_SECS"),
                2,
            )?),
        };

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let mut allowed_origins = vec![DEFAULT_ALLOWED_ORIGIN.to_string()];
        if let Some(frontend) = get("FRONTEND_URL") {
            allowed_origins.extend(
                frontend
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty()),
            );
        }
        let cors = CorsConfig {
            allowed_origins,
            allow_all: parse_or("CORS_ALLOW_ALL", get("CORS_ALLOW_ALL"), false)?,
        };

        Ok(Self {
            server,
            database,
            jwt_secret,
            bcrypt_cost,
            cors,
        })
    }
}

fn database_source<F>(get: &F) -> Result<DatabaseSource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = get("DATABASE_URL").or_else(|| get("POSTGRES_DSN")) {
        return Ok(DatabaseSource::Url(url));
    }

    match (
        get("DATABASE_HOST"),
        get("DATABASE_USER"),
        get("DATABASE_PASSWORD"),
        get("DATABASE_NAME"),
    ) {
        (Some(host), Some(user), Some(password), Some(name)) => Ok(DatabaseSource::Discrete {
            host,
            port: parse_or("DATABASE_PORT", get("DATABASE_PORT"), 5432)?,
            user,
            password,
            name,
        }),
        _ => Err(ConfigError::NoDatabase),
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
        ])
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 25);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.database.connect_attempts, 5);
        assert_eq!(config.database.retry_delay, Duration::from_secs(2));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.cors.allowed_origins, vec![DEFAULT_ALLOWED_ORIGIN]);
        assert!(!config.cors.allow_all);
    }

    #[test]
    fn jwt_secret_is_required() {
        let err = load(&[("DATABASE_URL", "postgres://localhost/db"), ("JWT_SECRET", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn database_url_wins_over_other_sources() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://first/db"),
            ("POSTGRES_DSN", "postgres://second/db"),
            ("DATABASE_HOST", "third"),
            ("DATABASE_USER", "u"),
            ("DATABASE_PASSWORD", "p"),
            ("DATABASE_NAME", "db"),
        ])
        .unwrap();
        assert!(matches!(config.database.source, DatabaseSource::Url(ref u) if u == "postgres://first/db"));

        let config = load(&[
            ("JWT_SECRET", "s"),
            ("POSTGRES_DSN", "postgres://second/db"),
            ("DATABASE_HOST", "third"),
            ("DATABASE_USER", "u"),
            ("DATABASE_PASSWORD", "p"),
            ("DATABASE_NAME", "db"),
        ])
        .unwrap();
        assert!(matches!(config.database.source, DatabaseSource::Url(ref u) if u == "postgres://second/db"));
    }

    #[test]
    fn discrete_fields_default_port() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_HOST", "db.internal"),
            ("DATABASE_USER", "app"),
            ("DATABASE_PASSWORD", "hunter2"),
            ("DATABASE_NAME", "invoices"),
        ])
        .unwrap();

        match &config.database.source {
            DatabaseSource::Discrete { host, port, .. } => {
                assert_eq!(host, "db.internal");
                assert_eq!(*port, 5432);
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert!(!config.database.source.describe().contains("hunter2"));
        assert!(config.database.source.connect_options().is_ok());
    }

    #[test]
    fn incomplete_database_config_fails() {
        let err = load(&[("JWT_SECRET", "s"), ("DATABASE_HOST", "h"), ("DATABASE_USER", "u")]).unwrap_err();
        assert!(matches!(err, ConfigError::NoDatabase));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://localhost/db"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://localhost/db"),
            ("BCRYPT_COST", "2"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));
    }

    #[test]
    fn frontend_origins_are_added() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://localhost/db"),
            ("FRONTEND_URL", "https://app.example.com, https://www.example.com"),
            ("CORS_ALLOW_ALL", "true"),
        ])
        .unwrap();
        assert_eq!(
            config.cors.allowed_origins,
            vec![
                DEFAULT_ALLOWED_ORIGIN,
                "https://app.example.com",
                "https://www.example.com"
            ]
        );
        assert!(config.cors.allow_all);
    }

    #[test]
    fn url_credentials_are_masked() {
        assert_eq!(
            mask_url_credentials("postgres://user:pw@host:5432/db"),
            "postgres://***@host:5432/db"
        );
        assert_eq!(mask_url_credentials("postgres://host/db"), "postgres://host/db");
    }
}
