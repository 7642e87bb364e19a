//! Handlers HTTP e DTOs de entrada

pub mod appointments;
pub mod auth;
pub mod health;
pub mod moods;
pub mod tasks;
pub mod users;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::extract::FromRequest;
use axum::http::Request;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;

/// Corpo JSON desserializado e validado; falhas viram 400 com corpo JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: Send + 'static,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ApiError::BadRequest(format!("Corpo da requisição inválido: {}", rejection.body_text()))
        })?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Corpo JSON opcional: requisição sem corpo resulta em `None`. Um corpo
/// presente passa pelas mesmas regras de [`ValidatedJson`].
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for OptionalJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: Send + 'static,
    Bytes: FromRequest<S, B, Rejection = BytesRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            ApiError::BadRequest(format!("Corpo da requisição inválido: {}", rejection.body_text()))
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }
        let value: T = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("Corpo da requisição inválido: {}", e)))?;
        value.validate()?;
        Ok(OptionalJson(Some(value)))
    }
}

/// Intervalo opcional de datas (`?from=...&to=...`, RFC 3339)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRangeQuery {
    pub fn check(&self) -> Result<(), ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::BadRequest(
                    "A data inicial deve ser anterior à data final".to_string(),
                ));
            }
        }
        Ok(())
    }
}
