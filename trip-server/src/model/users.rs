//! Credential store

use chrono::{DateTime, Utc};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Newtype for user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl UserId {
    /// Fetches `User` with this id from database
    pub async fn fetch(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Option<User>, Error> {
        User::fetch(db, self).await
    }
}

/// Registered user
#[derive(Derivative, Clone, PartialEq, FromRow)]
#[derivative(Debug)]
pub struct User {
    pub id: UserId,
    /// Login email, compared exactly as stored
    pub email: String,
    /// Argon2 PHC string
    #[derivative(Debug = "ignore")]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Fetches user by their id
    pub async fn fetch(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        user_id: UserId,
    ) -> Result<Option<Self>, Error> {
        let user =
            sqlx::query_as("select id, email, password_hash, created_at from users where id = ?")
                .bind(user_id)
                .fetch_optional(db)
                .await?;

        Ok(user)
    }

    /// Fetches user by their email
    pub async fn fetch_by_email(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        email: &str,
    ) -> Result<Option<Self>, Error> {
        let user =
            sqlx::query_as("select id, email, password_hash, created_at from users where email = ?")
                .bind(email)
                .fetch_optional(db)
                .await?;

        Ok(user)
    }

    /// Creates user in the database returning its id.
    ///
    /// The unique constraint on `email` is what guarantees there is only one account per email -
    /// callers checking for existing email first only get a nicer error path out of it.
    pub async fn create(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        email: &str,
        password_hash: &str,
    ) -> Result<UserId, Error> {
        let result =
            sqlx::query("insert into users (email, password_hash, created_at) values (?, ?, ?)")
                .bind(email)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(db)
                .await
                .map_err(|err| match err {
                    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                        Error::EmailTaken
                    }
                    err => Error::Storage(err),
                })?;

        Ok(UserId(result.last_insert_rowid()))
    }
}
