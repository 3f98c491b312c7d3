//! Service global context

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::Result;

pub mod auth;
pub mod history;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config;
use crate::model::auth::Auth;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid SQLite path: {path}")]
    InvalidSQLitePath { path: PathBuf },
}

/// Shared state of the service: database access and the session authority
#[derive(Clone)]
pub struct Model {
    /// Database access
    db: SqlitePool,
    /// Authentication service
    auth: Arc<Auth>,
}

impl Model {
    /// Context for testing purposes - using the in-memory SQLite database
    #[cfg(test)]
    pub async fn test() -> Result<Self> {
        Self::with_config(
            config::Database::Memory { max_connections: 1 },
            &config::Auth::test(),
        )
        .await
    }

    /// Context from configuration
    ///
    /// If the database is created in-memory, the migrations are being executed automatically. If
    /// database is file based migrations would be executed only if requested by configuration.
    pub async fn with_config(db: config::Database, auth: &config::Auth) -> Result<Self> {
        use config::Database::*;

        let db = match db {
            Memory { max_connections } => {
                let opts = SqliteConnectOptions::new()
                    .filename(":memory:")
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .shared_cache(true);

                // The in-memory database lives only as long as one of its connections does
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_lazy_with(opts);

                sqlx::migrate!("model/migrations").run(&pool).await?;
                pool
            }

            SqLite {
                path,
                max_connections,
                migrate,
            } => {
                let path = path
                    .as_path()
                    .to_str()
                    .ok_or_else(|| Error::InvalidSQLitePath { path: path.clone() })?;

                let opts = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .foreign_keys(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(opts);

                if migrate {
                    sqlx::migrate!("model/migrations").run(&pool).await?;
                }

                pool
            }
        };

        let auth = Auth::new(auth)?;

        Ok(Self {
            db,
            auth: Arc::new(auth),
        })
    }

    /// Accesses the DB pool
    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Accesses the authentication service
    pub fn auth(&self) -> &Auth {
        &self.auth
    }
}
