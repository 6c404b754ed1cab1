//! Joining an activity.
//!
//! A join is one write transaction. Its first statement is the conditional
//! participant insert, so SQLite hands out the write lock before anything is
//! read and concurrent joins on the same database queue up behind it. Inside
//! the transaction the count is re-read, an overshoot rolls the insert back,
//! and reaching the ceiling flips the activity to `full` before commit.
//!
//! The chat notification runs after commit on its own task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{activity_chat_repo, activity_repo, membership_repo};
use crate::error::ActivityError;
use crate::models::{ActivityStatus, Membership};
use crate::services::chat_service::{bounded, ChatNotifier};
use crate::services::user_directory::{display_name_or_fallback, UserDirectory};
use crate::services::Collaborators;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub membership: Membership,
    pub became_full: bool,
}

pub async fn join_activity(
    pool: &SqlitePool,
    collaborators: &Collaborators,
    activity_id: &str,
    user_id: &str,
) -> Result<JoinOutcome, ActivityError> {
    let membership_id = Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    let inserted = membership_repo::insert_participant_if_open(
        &mut *tx,
        &membership_id,
        user_id,
        activity_id,
        Utc::now(),
    )
    .await?;

    let Some(row) = inserted else {
        // Dropping `tx` on return rolls back; nothing was written anyway.
        return Err(classify_rejection(&mut tx, activity_id, user_id).await?);
    };

    let activity = activity_repo::load_by_id(&mut *tx, activity_id)
        .await?
        .ok_or(ActivityError::NotFound)?;
    let count = membership_repo::count_by_activity(&mut *tx, activity_id).await?;
    if count > activity.max_participants {
        warn!(
            activity_id,
            user_id,
            count,
            max = activity.max_participants,
            "Join overshot capacity, rolling back"
        );
        tx.rollback().await?;
        return Err(ActivityError::ActivityFull);
    }

    let became_full = activity_repo::mark_full_if_at_capacity(&mut *tx, activity_id).await?;
    tx.commit().await?;

    info!(activity_id, user_id, count, "User joined activity");
    if became_full {
        info!(activity_id, "Activity reached capacity, status set to full");
    }

    spawn_member_joined(
        pool.clone(),
        collaborators.chat.clone(),
        collaborators.users.clone(),
        collaborators.chat_timeout,
        activity_id.to_string(),
        user_id.to_string(),
    );

    Ok(JoinOutcome {
        membership: Membership::try_from(row)?,
        became_full,
    })
}

/// Works out why the conditional insert wrote nothing, in the order a caller
/// would check: missing, closed, duplicate, at capacity.
///
/// Status is checked before membership, so a member retrying after the
/// activity went `full` gets `NotJoinable`, not `AlreadyMember`.
async fn classify_rejection(
    tx: &mut Transaction<'_, Sqlite>,
    activity_id: &str,
    user_id: &str,
) -> Result<ActivityError, ActivityError> {
    let Some(activity) = activity_repo::load_by_id(&mut **tx, activity_id).await? else {
        return Ok(ActivityError::NotFound);
    };
    if ActivityStatus::parse(&activity.status) != Some(ActivityStatus::Active) {
        return Ok(ActivityError::NotJoinable);
    }
    if membership_repo::exists(&mut **tx, user_id, activity_id).await? {
        return Ok(ActivityError::AlreadyMember);
    }
    Ok(ActivityError::ActivityFull)
}

fn spawn_member_joined(
    pool: SqlitePool,
    chat: Arc<dyn ChatNotifier>,
    users: Arc<dyn UserDirectory>,
    timeout: Duration,
    activity_id: String,
    user_id: String,
) {
    tokio::spawn(async move {
        let channel = match activity_chat_repo::load_channel(&pool, &activity_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                info!(activity_id = %activity_id, "No chat channel linked, skipping notification");
                return;
            }
            Err(e) => {
                warn!(activity_id = %activity_id, "Chat channel lookup failed: {}", e);
                return;
            }
        };

        let display_name = display_name_or_fallback(users.as_ref(), &user_id).await;
        let added = bounded(
            timeout,
            chat.add_member(&channel.channel_id, &user_id, &display_name),
        )
        .await;
        if let Err(e) = added {
            warn!(
                activity_id = %activity_id,
                user_id = %user_id,
                "Adding member to chat channel failed: {}",
                e
            );
        }
    });
}
