use api_types::error::ErrorResponse;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;
use sea_orm::{DbErr, SqlErr};

pub use server::{ServerState, router, run_with_listener, spawn_with_listener};

mod exchange;
mod server;
mod transactions;
mod user;
mod wallet;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UserNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::UnsupportedCurrency(_)
        | EngineError::InsufficientFunds(_)
        | EngineError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::RateUnavailable(_) | EngineError::StorageUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::PartialExchange(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: &EngineError) -> String {
    match err {
        EngineError::StorageUnavailable(db_err) => {
            tracing::error!("database error: {db_err}");
            "service temporarily unavailable".to_string()
        }
        EngineError::RateUnavailable(reason) => {
            tracing::warn!("rate service error: {reason}");
            "exchange rates are temporarily unavailable".to_string()
        }
        EngineError::PartialExchange(partial) => {
            tracing::error!("{partial}");
            "exchange could not be completed, the wallet will be reconciled".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => {
                let status = status_for_engine_error(&err);
                // Any outage is worth a later retry by the client, rate
                // failures included, even though the engine never retries them.
                let body = ErrorResponse {
                    error: message_for_engine_error(&err),
                    code: err.code().to_string(),
                    retryable: status == StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, body)
            }
            ServerError::Generic(error) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error,
                    code: "bad_request".to_string(),
                    retryable: false,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<DbErr> for ServerError {
    fn from(value: DbErr) -> Self {
        match value.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                Self::Engine(EngineError::ExistingKey(detail))
            }
            _ => Self::Engine(EngineError::StorageUnavailable(value)),
        }
    }
}
