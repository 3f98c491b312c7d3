//! HTTP API of the service
//!
//! Every request goes through the same gates: authentication (for everything except registering
//! and logging in), input validation, itinerary generation and persisting it in the history. A
//! request rejected at any gate leaves no trace in the storage.

use actix_web::web::{self, Data, Json, ServiceConfig};
use actix_web::{HttpResponse, get, middleware, post};
use chrono::NaiveDate;
use itinerary::{Itinerary, ItineraryRequest, Pace};
use serde::{Deserialize, Serialize};
use tracing::info;


pub mod error;
mod session;

use crate::model::Model;
use crate::model::auth::{Session, SessionToken};
use crate::model::history::{HistoryRecord, Limit};
use crate::model::users::UserId;
use error::ApiError;
use session::Caller;

/// Credentials sent to register or log in
#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

/// Returned on successful register or login
#[derive(Debug, Serialize)]
struct TokenResponse {
    user_id: UserId,
    access_token: SessionToken,
    token_type: &'static str,
}

impl From<Session> for TokenResponse {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            access_token: session.token,
            token_type: "bearer",
        }
    }
}

/// Itinerary request as it comes over the wire, with dates not yet validated
#[derive(Debug, Deserialize)]
struct GenerateRequest {
    origin: String,
    destination: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    interests: Vec<String>,
    pace: Pace,
}

impl GenerateRequest {
    fn validate(self) -> Result<ItineraryRequest, ApiError> {
        let parse = |date: &str| -> Result<NaiveDate, ApiError> {
            Ok(itinerary::parse_date(date)?)
        };

        let request = ItineraryRequest {
            start_date: parse(&self.start_date)?,
            end_date: parse(&self.end_date)?,
            origin: self.origin,
            destination: self.destination,
            interests: self.interests,
            pace: self.pace,
        };
        request.validate()?;

        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    history: Vec<HistoryRecord>,
}

/// Creates a new account and opens a session for it
#[post("/register")]
async fn register(
    model: Data<Model>,
    Json(body): Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let session = model
        .auth()
        .register(model.db(), &body.email, &body.password)
        .await?;

    Ok(HttpResponse::Created().json(TokenResponse::from(session)))
}

/// Opens a session for an existing account
#[post("/login")]
async fn login(
    model: Data<Model>,
    Json(body): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = model
        .auth()
        .login(model.db(), &body.email, &body.password)
        .await?;

    Ok(Json(session.into()))
}

/// Expands the trip into an itinerary and records it in the caller's history
#[post("/generate", wrap = "middleware::from_fn(session::middleware)")]
async fn generate(
    caller: Caller,
    model: Data<Model>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<Itinerary>, ApiError> {
    let user_id = caller.user_id();
    let request = body.validate()?;
    let itinerary = itinerary::expand(&request)?;

    let history_id = HistoryRecord::append(model.db(), user_id, &request, &itinerary).await?;
    info!(%user_id, %history_id, days = itinerary.days.len(), "Itinerary generated");

    Ok(Json(itinerary))
}

/// Lists the caller's history, the most recent first
#[get("/history", wrap = "middleware::from_fn(session::middleware)")]
async fn history(
    caller: Caller,
    model: Data<Model>,
    query: web::Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = Limit::parse(query.limit.as_deref());
    let history = HistoryRecord::list_for_user(model.db(), caller.user_id(), limit).await?;

    Ok(Json(HistoryResponse { history }))
}

/// Malformed JSON bodies are reported the same way as other invalid input
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| {
            ApiError::Validation(format!("Invalid request body: {err}")).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| {
            ApiError::Validation(format!("Invalid query: {err}")).into()
        })
}

/// Returns configuration function for the ActixWeb services
pub fn configure(context: Model) -> impl Fn(&mut ServiceConfig) + Clone {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(Data::new(context.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .service(register)
            .service(login)
            .service(generate)
            .service(history);
    }
}
