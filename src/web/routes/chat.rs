use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use serde::Serialize;
use serde_json::Value;

use crate::database::{activity_chat_repo, activity_repo, membership_repo};
use crate::error::ActivityError;
use crate::services::chat_service::{bounded, ChatError, ChatToken};
use crate::services::user_directory::display_name_or_fallback;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::response::{data, ApiResponse};
use crate::web::state::AppState;

pub enum ChatRouteError {
    Activity(ActivityError),
    Chat(ChatError),
}

impl From<ActivityError> for ChatRouteError {
    fn from(e: ActivityError) -> Self {
        ChatRouteError::Activity(e)
    }
}

impl From<sqlx::Error> for ChatRouteError {
    fn from(e: sqlx::Error) -> Self {
        ChatRouteError::Activity(ActivityError::Database(e))
    }
}

impl From<ChatError> for ChatRouteError {
    fn from(e: ChatError) -> Self {
        ChatRouteError::Chat(e)
    }
}

impl IntoResponse for ChatRouteError {
    fn into_response(self) -> Response {
        match self {
            ChatRouteError::Activity(e) => e.into_response(),
            ChatRouteError::Chat(e) => e.into_response(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl ChannelInfo {
    fn none() -> Self {
        Self {
            channel_id: None,
            state: None,
        }
    }
}

pub async fn token_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<ApiResponse<ChatToken>, ChatRouteError> {
    let collaborators = &state.collaborators;
    let name = display_name_or_fallback(collaborators.users.as_ref(), &auth_user.id).await;
    let token = bounded(
        collaborators.chat_timeout,
        collaborators.chat.issue_token(&auth_user.id, &name),
    )
    .await?;
    Ok(data(StatusCode::OK, token))
}

async fn ensure_activity(state: &AppState, activity_id: &str) -> Result<(), ChatRouteError> {
    if activity_repo::load_by_id(&state.pool, activity_id).await?.is_none() {
        return Err(ActivityError::NotFound.into());
    }
    Ok(())
}

pub async fn join_channel_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<String>,
) -> Result<ApiResponse<ChannelInfo>, ChatRouteError> {
    ensure_activity(&state, &activity_id).await?;
    if !membership_repo::exists(&state.pool, &auth_user.id, &activity_id).await? {
        return Err(ActivityError::NotMember.into());
    }
    let Some(channel) = activity_chat_repo::load_channel(&state.pool, &activity_id).await? else {
        return Ok(data(StatusCode::OK, ChannelInfo::none()));
    };

    let collaborators = &state.collaborators;
    let name = display_name_or_fallback(collaborators.users.as_ref(), &auth_user.id).await;
    bounded(
        collaborators.chat_timeout,
        collaborators
            .chat
            .add_member(&channel.channel_id, &auth_user.id, &name),
    )
    .await?;

    Ok(data(
        StatusCode::OK,
        ChannelInfo {
            channel_id: Some(channel.channel_id),
            state: None,
        },
    ))
}

pub async fn leave_channel_handler(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<String>,
) -> Result<ApiResponse<ChannelInfo>, ChatRouteError> {
    ensure_activity(&state, &activity_id).await?;
    let Some(channel) = activity_chat_repo::load_channel(&state.pool, &activity_id).await? else {
        return Ok(data(StatusCode::OK, ChannelInfo::none()));
    };

    bounded(
        state.collaborators.chat_timeout,
        state
            .collaborators
            .chat
            .remove_member(&channel.channel_id, &auth_user.id),
    )
    .await?;

    Ok(data(
        StatusCode::OK,
        ChannelInfo {
            channel_id: Some(channel.channel_id),
            state: None,
        },
    ))
}

pub async fn channel_handler(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<String>,
) -> Result<ApiResponse<ChannelInfo>, ChatRouteError> {
    ensure_activity(&state, &activity_id).await?;
    let Some(channel) = activity_chat_repo::load_channel(&state.pool, &activity_id).await? else {
        return Ok(data(StatusCode::OK, ChannelInfo::none()));
    };

    let channel_state = bounded(
        state.collaborators.chat_timeout,
        state.collaborators.chat.fetch_channel_state(&channel.channel_id),
    )
    .await?;

    Ok(data(
        StatusCode::OK,
        ChannelInfo {
            channel_id: Some(channel.channel_id),
            state: Some(channel_state),
        },
    ))
}
