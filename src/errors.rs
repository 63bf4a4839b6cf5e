// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScamGuardError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Analysis provider error: {0}")]
    Provider(String),

    #[error("Media processing error: {0}")]
    MediaProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<redis::RedisError> for ScamGuardError {
    fn from(e: redis::RedisError) -> Self {
        ScamGuardError::Redis(e.to_string())
    }
}

impl From<serde_json::Error> for ScamGuardError {
    fn from(e: serde_json::Error) -> Self {
        ScamGuardError::Serialization(e.to_string())
    }
}

impl ResponseError for ScamGuardError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScamGuardError::Redis(_) | ScamGuardError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ScamGuardError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScamGuardError::MediaProcessing(_) | ScamGuardError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ScamGuardError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ScamGuardError::Redis(_) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Database error",
                "message": "Scan history is temporarily unavailable."
            })),
            // Provider details stay in the log; the caller only gets a generic message.
            ScamGuardError::Provider(_) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI service error",
                    "message": "An unexpected error occurred during analysis. Please try again."
                }))
            }
            ScamGuardError::MediaProcessing(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Media processing error",
                    "message": self.to_string()
                }))
            }
            ScamGuardError::Serialization(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error",
                    "message": self.to_string()
                }))
            }
            ScamGuardError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            ScamGuardError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not found",
                "message": self.to_string()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn provider_errors_hide_details() {
        let err = ScamGuardError::Provider("Gemini error: quota exceeded for key abc".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("AI service error"));
        assert!(!text.contains("quota"));
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ScamGuardError::Validation("No content provided for analysis.".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No content provided for analysis.");
    }
}
