use axum::{
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use http::Method;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

use middleware::auth as auth_middleware;
use routes::{activities, chat, health};
pub use state::AppState;

pub fn build_router(state: AppState, frontend_url: &str) -> Router {
    let protected_routes = Router::new()
        .route("/activities", post(activities::create_activity_handler))
        .route("/activities/feed", get(activities::feed_handler))
        .route("/activities/me", get(activities::my_activities_handler))
        .route(
            "/activities/:activity_id",
            get(activities::activity_detail_handler),
        )
        .route(
            "/activities/:activity_id/join",
            post(activities::join_activity_handler),
        )
        .route("/chat/token", post(chat::token_handler))
        .route("/chat/channels/:activity_id", get(chat::channel_handler))
        .route(
            "/chat/channels/:activity_id/join",
            post(chat::join_channel_handler),
        )
        .route(
            "/chat/channels/:activity_id/leave",
            post(chat::leave_channel_handler),
        )
        .layer(axum::middleware::from_fn(auth_middleware::require_auth));

    Router::new()
        // Public routes
        .route("/health", get(health::health_handler))
        // Protected routes
        .merge(protected_routes)
        // Layers
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(frontend_url))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        // State
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(frontend_url, "FRONTEND_URL is not a valid origin, CORS disabled");
            cors
        }
    }
}
