use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::services::chat_service::ChatError;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid latitude or longitude")]
    InvalidCoordinates,

    #[error("Activity not found")]
    NotFound,

    #[error("Activity is not available for joining")]
    NotJoinable,

    #[error("User is already a member of this activity")]
    AlreadyMember,

    #[error("Activity is full")]
    ActivityFull,

    #[error("User is not a member of this activity")]
    NotMember,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ActivityError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityError::Validation(_) => "validation_error",
            ActivityError::InvalidCoordinates => "invalid_coordinates",
            ActivityError::NotFound => "not_found",
            ActivityError::NotJoinable => "not_joinable",
            ActivityError::AlreadyMember => "already_member",
            ActivityError::ActivityFull => "activity_full",
            ActivityError::NotMember => "not_member",
            ActivityError::Database(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActivityError::NotFound => StatusCode::NOT_FOUND,
            ActivityError::NotMember => StatusCode::FORBIDDEN,
            ActivityError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ActivityError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ActivityError::Database(e) => {
                error!("Database failure: {}", e);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "error": self.kind(),
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

// Only the chat-only routes surface these; the core logs and drops them.
impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!("Chat backend call failed: {}", self);

        let (kind, message) = match &self {
            ChatError::Disabled => ("chat_unavailable", "Chat is not available"),
            _ => ("chat_error", "Chat backend request failed"),
        };
        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "error": kind,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ActivityError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ActivityError::NotJoinable.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ActivityError::AlreadyMember.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ActivityError::ActivityFull.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ActivityError::InvalidCoordinates.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ActivityError::NotMember.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ActivityError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_database_detail_is_not_leaked() {
        let response = ActivityError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn test_chat_error_status() {
        assert_eq!(ChatError::Disabled.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ChatError::Timeout(std::time::Duration::from_millis(5)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ChatError::Upstream {
                status: StatusCode::NOT_FOUND,
                body: None
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
