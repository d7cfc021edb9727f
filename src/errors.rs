use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sqlx::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("External error: {0}")]
    External(String),
    #[error("Plan not applied: {message}")]
    PlanNotApplied {
        id: uuid::Uuid,
        message: String,
        errors: Vec<String>,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::PlanNotApplied { id, message, errors } => {
                // The approval caller gets a structured body it can show to
                // the reviewer, not a bare status line.
                let body = serde_json::json!({
                    "id": id,
                    "result": "not_applied",
                    "message": message,
                    "errors": errors,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            AppError::Db(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: Error) -> Self {
        AppError::Db(value)
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}
