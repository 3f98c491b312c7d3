//! Per-user history of generated itineraries

use std::num::IntErrorKind;

use chrono::{DateTime, Utc};
use itinerary::{Itinerary, ItineraryRequest};
use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use thiserror::Error;

use crate::model::users::UserId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("History payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Newtype for history record id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct HistoryId(i64);

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bound on the number of records returned by a single listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(u32);

impl Limit {
    pub const DEFAULT: Self = Self(50);
    pub const MAX: Self = Self(500);

    /// Builds the limit from an untrusted query value.
    ///
    /// Missing, non-numeric and non-positive values fall back to the default, too big values are
    /// clamped to the maximum.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(limit)) if limit > 0 => Self(limit.min(i64::from(Self::MAX.0)) as u32),
            Some(Err(err)) if *err.kind() == IntErrorKind::PosOverflow => Self::MAX,
            _ => Self::DEFAULT,
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Single generation stored for its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    /// Owner of the record, never exposed back
    #[serde(skip)]
    pub user_id: UserId,
    pub request: ItineraryRequest,
    pub response: Itinerary,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Stores the request together with the itinerary generated for it
    pub async fn append(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        user_id: UserId,
        request: &ItineraryRequest,
        response: &Itinerary,
    ) -> Result<HistoryId, Error> {
        let request_json = serde_json::to_string(request)?;
        let response_json = serde_json::to_string(response)?;

        let result = sqlx::query(
            "insert into history (user_id, request_json, response_json, created_at) \
             values (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(request_json)
        .bind(response_json)
        .bind(Utc::now())
        .execute(db)
        .await?;

        Ok(HistoryId(result.last_insert_rowid()))
    }

    /// Lists records owned by `user_id`, the most recent first
    pub async fn list_for_user(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        user_id: UserId,
        limit: Limit,
    ) -> Result<Vec<Self>, Error> {
        let rows: Vec<(HistoryId, UserId, String, String, DateTime<Utc>)> = sqlx::query_as(
            "select id, user_id, request_json, response_json, created_at from history \
             where user_id = ? order by id desc limit ?",
        )
        .bind(user_id)
        .bind(i64::from(limit.get()))
        .fetch_all(db)
        .await?;

        rows.into_iter()
            .map(|(id, user_id, request, response, created_at)| -> Result<Self, Error> {
                Ok(Self {
                    id,
                    user_id,
                    request: serde_json::from_str(&request)?,
                    response: serde_json::from_str(&response)?,
                    created_at,
                })
            })
            .collect()
    }
}
