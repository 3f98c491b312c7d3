//! Service configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use derivative::Derivative;
use serde::{Deserialize, Deserializer};
use tracing_subscriber::filter::Directive;

/// Signing secret used when none is configured. Must be overridden in production, either in the
/// config file or with the `SECRET_KEY` environment variable.
pub const INSECURE_DEFAULT_SECRET: &str = "change_this_secret_for_prod";

/// Logging output format
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Compact
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Database {
    /// In-memory database, always migrated on startup
    Memory {
        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,
    },
    /// File based SQLite database
    #[serde(rename = "sqlite")]
    SqLite {
        path: PathBuf,
        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,
        /// Run migrations on startup
        #[serde(default)]
        migrate: bool,
    },
}

impl Database {
    fn default_max_connections() -> u32 {
        4
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::Memory {
            max_connections: Self::default_max_connections(),
        }
    }
}

/// Authentication configuration
#[derive(Derivative, Clone, Deserialize)]
#[derivative(Debug, Default)]
pub struct Auth {
    /// Secret session tokens are sealed with
    #[derivative(Debug = "ignore", Default(value = "INSECURE_DEFAULT_SECRET.to_owned()"))]
    #[serde(default = "Auth::default_secret")]
    pub secret: String,

    /// How long an issued session token stays valid
    #[derivative(Default(value = "24"))]
    #[serde(default = "Auth::default_token_lifetime_hours")]
    pub token_lifetime_hours: u32,

    /// Argon2 memory cost in KiB
    #[derivative(Default(value = "argon2::Params::DEFAULT_M_COST"))]
    #[serde(default = "Auth::default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    #[derivative(Default(value = "argon2::Params::DEFAULT_T_COST"))]
    #[serde(default = "Auth::default_hash_iterations")]
    pub hash_iterations: u32,
}

impl Auth {
    fn default_secret() -> String {
        INSECURE_DEFAULT_SECRET.to_owned()
    }

    fn default_token_lifetime_hours() -> u32 {
        24
    }

    fn default_hash_memory_kib() -> u32 {
        argon2::Params::DEFAULT_M_COST
    }

    fn default_hash_iterations() -> u32 {
        argon2::Params::DEFAULT_T_COST
    }

    /// Checks if the insecure development secret is still in use
    pub fn uses_default_secret(&self) -> bool {
        self.secret == INSECURE_DEFAULT_SECRET
    }

    /// Cheap hashing parameters, so tests don't spend seconds on every registration
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            hash_memory_kib: 64,
            hash_iterations: 1,
            ..Self::default()
        }
    }
}

/// Top level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address where to host the service
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,

    /// Database configuration
    #[serde(default)]
    pub db: Database,

    /// Authentication configuration
    #[serde(default)]
    pub auth: Auth,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 8000).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.host, "127.0.0.1:8000".parse().unwrap());
        assert!(matches!(config.db, Database::Memory { max_connections: 4 }));
        assert!(config.auth.uses_default_secret());
        assert_eq!(config.auth.token_lifetime_hours, 24);
        assert!(config.logging.filters.is_empty());
    }

    #[test]
    fn full_config() {
        let config: Config = toml::from_str(
            r#"
            host = "0.0.0.0:9000"

            [logging]
            filters = ["trip_server=debug"]
            format = "pretty"

            [db]
            kind = "sqlite"
            path = "trips.db"
            migrate = true

            [auth]
            secret = "s3cret"
            token_lifetime_hours = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.logging.filters.len(), 1);
        assert!(matches!(config.logging.format, LogFormat::Pretty));
        match config.db {
            Database::SqLite {
                path,
                max_connections,
                migrate,
            } => {
                assert_eq!(path, PathBuf::from("trips.db"));
                assert_eq!(max_connections, 4);
                assert!(migrate);
            }
            db => panic!("unexpected database config {db:?}"),
        }
        assert!(!config.auth.uses_default_secret());
        assert_eq!(config.auth.token_lifetime_hours, 2);
        assert_eq!(config.auth.hash_memory_kib, argon2::Params::DEFAULT_M_COST);
    }

    #[test]
    fn secret_is_not_printed() {
        let auth = Auth {
            secret: "very-secret-value".to_owned(),
            ..Auth::default()
        };
        assert!(!format!("{auth:?}").contains("very-secret-value"));
    }
}
