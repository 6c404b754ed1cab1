use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::ActivityError;
use crate::services::activity_service::{
    self, ActivityView, CreateActivityRequest, CreatedActivity, MyActivities,
};
use crate::services::feed_service::{self, FeedQuery};
use crate::services::signup_service::{self, JoinOutcome};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::response::{data, message_with, ApiResponse};
use crate::web::state::AppState;

pub async fn create_activity_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<ApiResponse<CreatedActivity>, ActivityError> {
    let Json(request) =
        payload.map_err(|rejection| ActivityError::Validation(rejection.body_text()))?;
    let created = activity_service::create_activity(
        &state.pool,
        &state.collaborators,
        &auth_user.id,
        request,
    )
    .await?;
    Ok(data(StatusCode::CREATED, created))
}

pub async fn feed_handler(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<FeedQuery>,
) -> Result<ApiResponse<Vec<ActivityView>>, ActivityError> {
    let point = query.point()?;
    let users = state.collaborators.users.as_ref();
    let feed = feed_service::load_feed(&state.pool, users, point).await?;
    Ok(data(StatusCode::OK, feed))
}

pub async fn my_activities_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<ApiResponse<MyActivities>, ActivityError> {
    let mine = activity_service::my_activities(
        &state.pool,
        state.collaborators.users.as_ref(),
        &auth_user.id,
    )
    .await?;
    Ok(data(StatusCode::OK, mine))
}

pub async fn activity_detail_handler(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<String>,
) -> Result<ApiResponse<ActivityView>, ActivityError> {
    let users = state.collaborators.users.as_ref();
    let view = activity_service::get_activity(&state.pool, users, &activity_id).await?;
    Ok(data(StatusCode::OK, view))
}

pub async fn join_activity_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<String>,
) -> Result<ApiResponse<JoinOutcome>, ActivityError> {
    let outcome = signup_service::join_activity(
        &state.pool,
        &state.collaborators,
        &activity_id,
        &auth_user.id,
    )
    .await?;
    Ok(message_with(StatusCode::OK, "Successfully joined activity", outcome))
}
