//! Authentication: credentials and session tokens
//!
//! Session tokens are stateless PASETO `v4.local` tokens. The sealing key is derived from the
//! configured secret, so any instance configured with the same secret accepts the token, and no
//! session is ever stored. The price is that a token can't be revoked - it stays valid until it
//! expires.

use std::str::FromStr;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, TimeDelta, Utc};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::errors::ClaimValidationError;
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::config;
use crate::model::users::{self, User, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email and password must not be empty")]
    MissingCredentials,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Session token error: {0}")]
    Token(#[from] pasetors::errors::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<users::Error> for Error {
    fn from(err: users::Error) -> Self {
        match err {
            users::Error::EmailTaken => Self::EmailTaken,
            users::Error::Storage(err) => Self::Storage(err),
        }
    }
}

/// PASETO implicit assertion for session tokens
const SESSION_APP_SECRET: &[u8] = b"TripPlannerSessionToken";

/// Errors of the `Authorization` header parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Invalid authorization format")]
    InvalidAuthorization,
    #[error("Invalid authorization scheme")]
    InvalidAuthorizationScheme,
}

/// Token presented with the `Authorization: Bearer <token>` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BearerToken {
    type Err = AuthorizationError;

    /// Header has to consist of exactly the scheme and the token, scheme is case insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
                Ok(Self(token.to_owned()))
            }
            (Some(_), Some(_), None) => Err(AuthorizationError::InvalidAuthorizationScheme),
            _ => Err(AuthorizationError::InvalidAuthorization),
        }
    }
}

/// Newtype for session token string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Freshly issued session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// User ID for this session
    pub user_id: UserId,
    /// Session token
    pub token: SessionToken,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
}

/// Outcome of authenticating a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    /// Token is authentic and not expired
    Authenticated(UserId),
    /// No usable credentials were presented
    Unauthenticated,
    /// Token is authentic, but past its expiration time
    Expired,
    /// Token can't be decoded, or was sealed with a different key or tampered with
    Malformed,
}

impl Authentication {
    /// Authenticated user, if any
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Self::Authenticated(user_id) => Some(user_id),
            _ => None,
        }
    }
}

/// Session data atached to the PASETO session token
#[derive(Debug, Clone, PartialEq)]
struct SessionData {
    /// User authorized by this token
    user_id: UserId,
    /// When the token stops being valid
    expires_at: DateTime<Utc>,
}

impl SessionData {
    /// Builds claims for this session issued at `issued_at`
    fn claims(&self, issued_at: DateTime<Utc>) -> Result<Claims, Error> {
        let mut claims = Claims::new()?;
        claims.subject(&self.user_id.to_string())?;
        claims.issued_at(&issued_at.to_rfc3339())?;
        claims.not_before(&issued_at.to_rfc3339())?;
        claims.expiration(&self.expires_at.to_rfc3339())?;
        Ok(claims)
    }

    /// Builds session data from token claims
    fn from_claims(claims: &Claims) -> Option<Self> {
        let user_id = claims.get_claim("sub")?.as_str()?.parse().ok()?;
        let expires_at = claims.get_claim("exp")?.as_str()?;
        let expires_at = DateTime::parse_from_rfc3339(expires_at).ok()?.to_utc();

        Some(Self {
            user_id,
            expires_at,
        })
    }
}

/// Authentication service
///
/// Registers and logs in users against the credential store, and issues and verifies session
/// tokens.
pub struct Auth {
    /// Key the session tokens are sealed with
    key: SymmetricKey<V4>,
    /// How long issued tokens are valid
    token_lifetime: TimeDelta,
    /// Password hasher configured with the cost parameters
    hasher: Argon2<'static>,
}

impl Auth {
    pub fn new(config: &config::Auth) -> Result<Self, Error> {
        let digest = Sha3_256::digest(config.secret.as_bytes());
        let key = SymmetricKey::<V4>::from(digest.as_slice())?;

        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|err| Error::Hashing(err.to_string()))?;

        Ok(Self {
            key,
            token_lifetime: TimeDelta::hours(config.token_lifetime_hours.into()),
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Registers a new user and opens a session for them
    pub async fn register(
        &self,
        db: &SqlitePool,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        ensure_credentials(email, password)?;

        if User::fetch_by_email(db, email).await?.is_some() {
            debug!("Registration with an already registered email");
            return Err(Error::EmailTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let user_id = User::create(db, email, &password_hash).await?;
        info!(%user_id, "User registered");

        self.issue_token(user_id)
    }

    /// Opens a session for existing user.
    ///
    /// Unknown email and wrong password are indistinguishable for the caller.
    pub async fn login(
        &self,
        db: &SqlitePool,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        ensure_credentials(email, password)?;

        let Some(user) = User::fetch_by_email(db, email).await? else {
            debug!("Login with unknown email");
            return Err(Error::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "Login with invalid password");
            return Err(Error::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.issue_token(user.id)
    }

    /// Issues a session token for the user
    pub fn issue_token(&self, user_id: UserId) -> Result<Session, Error> {
        self.issue_token_at(user_id, Utc::now())
    }

    /// Issues a session token as if it was issued at `issued_at`
    pub fn issue_token_at(
        &self,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> Result<Session, Error> {
        let session = SessionData {
            user_id,
            expires_at: issued_at + self.token_lifetime,
        };

        let claims = session.claims(issued_at)?;
        let token = local::encrypt(&self.key, &claims, None, Some(SESSION_APP_SECRET))?;

        Ok(Session {
            user_id,
            token: SessionToken(token),
            expires_at: session.expires_at,
        })
    }

    /// Verifies the token returning the authenticated user.
    ///
    /// Invalid token is a routine condition, so it is reported as `None` rather than an error.
    pub fn verify_token(&self, token: &str) -> Option<UserId> {
        self.authenticate(token).user_id()
    }

    /// Verifies the token, telling apart why it was not accepted
    pub fn authenticate(&self, token: &str) -> Authentication {
        self.authenticate_at(token, Utc::now())
    }

    fn authenticate_at(&self, token: &str, now: DateTime<Utc>) -> Authentication {
        let Ok(token) = UntrustedToken::<Local, V4>::try_from(token) else {
            return Authentication::Malformed;
        };

        // `exp` is still validated by pasetors against the wall clock, claims are only checked
        // once the token is authenticated
        let mut rules = ClaimsValidationRules::new();
        rules.disable_valid_at();

        let decrypted = local::decrypt(&self.key, &token, &rules, None, Some(SESSION_APP_SECRET));
        let token = match decrypted {
            Ok(token) => token,
            Err(pasetors::errors::Error::ClaimValidation(ClaimValidationError::Exp)) => {
                return Authentication::Expired;
            }
            Err(_) => return Authentication::Malformed,
        };

        let Some(session) = token.payload_claims().and_then(SessionData::from_claims) else {
            return Authentication::Malformed;
        };

        // `now` may run ahead of the wall clock
        if now >= session.expires_at {
            return Authentication::Expired;
        }

        Authentication::Authenticated(session.user_id)
    }

    /// Hashes the password with a fresh salt, off the async executor
    async fn hash_password(&self, password: &str) -> Result<String, Error> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| Error::Hashing(err.to_string()))
        })
        .await
        .map_err(|err| Error::Hashing(err.to_string()))?
    }

    /// Verifies the password against the stored PHC string, off the async executor
    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, Error> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&password_hash).map_err(|err| Error::Hashing(err.to_string()))?;

            // Cost parameters are read from the hash itself
            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(err) => Err(Error::Hashing(err.to_string())),
            }
        })
        .await
        .map_err(|err| Error::Hashing(err.to_string()))?
    }
}

fn ensure_credentials(email: &str, password: &str) -> Result<(), Error> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(Error::MissingCredentials);
    }
    Ok(())
}
