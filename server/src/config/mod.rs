use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be a plain SQL identifier, got '{value}'")]
    InvalidIdentifier { key: &'static str, value: String },

    #[error("RUN_MIGRATIONS only creates the default tables; disable it when table names are overridden")]
    MigrationsWithCustomTables,
}

/// Physical table names of the moderation schema.
///
/// Legacy deployments name these differently (`events_pending`, `pending_events`, ...), so
/// they are configuration rather than constants. Values are interpolated into SQL and must
/// pass [`validate_identifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub pending: String,
    pub published: String,
    pub tickets: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            pending: "event_pending".to_string(),
            published: "events".to_string(),
            tickets: "tickets".to_string(),
        }
    }
}

pub fn validate_identifier(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && value.len() <= 63 {
        Ok(value.to_string())
    } else {
        Err(ConfigError::InvalidIdentifier {
            key,
            value: value.to_string(),
        })
    }
}

#[cfg_attr(test, derive(Debug))]
pub struct Config {
    /// Absent means the server runs against the in-memory store.
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: u32,
    pub run_migrations: bool,
    pub tables: TableNames,
    pub notify_webhook_url: Option<String>,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = match get("HOST") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "HOST",
                value: raw,
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let defaults = TableNames::default();
        let tables = TableNames {
            pending: validate_identifier(
                "PENDING_EVENTS_TABLE",
                &get("PENDING_EVENTS_TABLE").unwrap_or(defaults.pending),
            )?,
            published: validate_identifier(
                "PUBLISHED_EVENTS_TABLE",
                &get("PUBLISHED_EVENTS_TABLE").unwrap_or(defaults.published),
            )?,
            tickets: validate_identifier(
                "TICKETS_TABLE",
                &get("TICKETS_TABLE").unwrap_or(defaults.tickets),
            )?,
        };

        // Bundled migrations target the default names, so they default off for custom ones.
        let default_tables = tables == TableNames::default();
        let run_migrations = match get("RUN_MIGRATIONS") {
            Some(raw) => parse_bool("RUN_MIGRATIONS", &raw)?,
            None => default_tables,
        };
        if run_migrations && !default_tables {
            return Err(ConfigError::MigrationsWithCustomTables);
        }

        let production = get("RUST_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            database_url: get("DATABASE_URL"),
            host,
            port,
            max_connections,
            run_migrations,
            tables,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
            production,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
