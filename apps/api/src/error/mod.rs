use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No recommendations found for the requested target")]
    NoRecommendations,

    #[error("Unknown model '{name}'. Available: {available:?}")]
    UnknownModel {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Stored recommendations are corrupted: {0}")]
    CorruptedStorage(String),

    #[error("Invalid source data: {0}")]
    DataError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::UnknownModel { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::NoRecommendations => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = ErrorResponse {
            error: self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::ExternalService(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::DataError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ApiError {
    fn from(err: ndarray::ShapeError) -> Self {
        ApiError::ModelInference(err.to_string())
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::Internal(format!("Configuration error: {}", err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ApiError::InvalidRequest("both ids".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("User not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::NoRecommendations.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::CorruptedStorage("bad json".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_model_lists_available_models() {
        let err = ApiError::UnknownModel {
            name: "popularity".into(),
            available: vec!["item_similarity", "random"],
        };
        let message = err.to_string();
        assert!(message.contains("popularity"));
        assert!(message.contains("item_similarity"));
    }
}
