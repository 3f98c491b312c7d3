//! Session management

use std::future::{Ready, ready};

use actix_web::body::MessageBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderMap};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use tracing::debug;

use crate::model::Model;
use crate::model::auth::{Auth, Authentication, BearerToken};
use crate::model::users::UserId;
use crate::service::error::{ApiError, INVALID_TOKEN, MISSING_AUTHORIZATION};

/// Authenticated caller of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(UserId);

impl Caller {
    pub fn user_id(self) -> UserId {
        self.0
    }
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let caller = req.extensions().get::<Caller>().copied();
        ready(caller.ok_or(ApiError::Unauthorized(MISSING_AUTHORIZATION)))
    }
}

/// Authenticates the request based on its `Authorization` header
pub fn authenticate(headers: &HeaderMap, auth: &Auth) -> Authentication {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<BearerToken>().ok());

    match token {
        Some(token) => auth.authenticate(token.as_str()),
        None => Authentication::Unauthenticated,
    }
}

/// Rejects requests without a valid session token, exposing the `Caller` to the handlers
pub async fn middleware<B>(req: ServiceRequest, next: Next<B>) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody + 'static,
{
    let context: Data<Model> = req
        .app_data()
        .cloned()
        .ok_or_else(|| ApiError::Internal("Missing context".to_owned()))?;

    match authenticate(req.headers(), context.auth()) {
        Authentication::Authenticated(user_id) => {
            // Token outlives its user if the store was reset under the same secret
            let user = user_id.fetch(context.db()).await.map_err(ApiError::from)?;
            if user.is_none() {
                debug!(%user_id, "Request with token of unknown user");
                return Err(ApiError::Unauthorized(INVALID_TOKEN).into());
            }

            req.extensions_mut().insert(Caller(user_id));
        }
        Authentication::Unauthenticated => {
            debug!(path = req.path(), "Request without valid authorization header");
            return Err(ApiError::Unauthorized(MISSING_AUTHORIZATION).into());
        }
        Authentication::Expired => {
            debug!(path = req.path(), "Request with expired token");
            return Err(ApiError::Unauthorized(INVALID_TOKEN).into());
        }
        Authentication::Malformed => {
            debug!(path = req.path(), "Request with malformed token");
            return Err(ApiError::Unauthorized(INVALID_TOKEN).into());
        }
    }

    next.call(req).await
}
