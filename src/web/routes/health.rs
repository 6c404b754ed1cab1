use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tracing::error;

use crate::web::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "statusCode": 200, "status": "ok" })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "statusCode": 503, "status": "database_unavailable" })),
            )
        }
    }
}
