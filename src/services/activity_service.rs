use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::activity_chat_repo;
use crate::database::activity_repo::{self, NewActivity};
use crate::database::membership_repo::{self, NewMembership, TryCreate};
use crate::error::ActivityError;
use crate::models::{Activity, GeoPoint, HostSummary, MembershipRole};
use crate::services::chat_service::bounded;
use crate::services::user_directory::{resolve_hosts, UserDirectory};
use crate::services::Collaborators;

/// Body of `POST /activities`. Every field is optional at the serde level so
/// that missing fields come back as one validation message instead of a
/// deserializer error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActivityRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<Vec<f64>>,
    pub address: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_participants: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedActivity {
    pub title: String,
    pub description: String,
    pub location: GeoPoint,
    pub address: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_participants: i64,
}

impl CreateActivityRequest {
    pub fn validate(self) -> Result<ValidatedActivity, ActivityError> {
        let mut problems: Vec<String> = Vec::new();

        let title = required_text("title", self.title, &mut problems);
        let description = required_text("description", self.description, &mut problems);
        let address = required_text("address", self.address, &mut problems);

        let location = match self.location.as_deref() {
            None => {
                problems.push("location is required".to_string());
                None
            }
            Some([longitude, latitude]) => {
                let point = GeoPoint::new(*longitude, *latitude);
                if point.is_valid() {
                    Some(point)
                } else {
                    problems.push("location must be a valid [longitude, latitude]".to_string());
                    None
                }
            }
            Some(_) => {
                problems.push("location must contain exactly two numbers".to_string());
                None
            }
        };

        let start_time = required_time("startTime", self.start_time, &mut problems);
        let end_time = required_time("endTime", self.end_time, &mut problems);
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end <= start {
                problems.push("endTime must be after startTime".to_string());
            }
        }

        let max_participants = match self.max_participants {
            None => {
                problems.push("maxParticipants is required".to_string());
                None
            }
            Some(n) if n < 1 => {
                problems.push("maxParticipants must be at least 1".to_string());
                None
            }
            Some(n) => Some(n),
        };

        match (title, description, address, location, start_time, end_time, max_participants) {
            (
                Some(title),
                Some(description),
                Some(address),
                Some(location),
                Some(start_time),
                Some(end_time),
                Some(max_participants),
            ) if problems.is_empty() => Ok(ValidatedActivity {
                title,
                description,
                location,
                address,
                start_time,
                end_time,
                max_participants,
            }),
            _ => Err(ActivityError::Validation(problems.join("; "))),
        }
    }
}

fn required_text(field: &str, value: Option<String>, problems: &mut Vec<String>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            problems.push(format!("{} is required", field));
            None
        }
    }
}

fn required_time(
    field: &str,
    value: Option<String>,
    problems: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let Some(raw) = value else {
        problems.push(format!("{} is required", field));
        return None;
    };
    let parsed = parse_timestamp(raw.trim());
    if parsed.is_none() {
        problems.push(format!("{} must be an ISO-8601 timestamp", field));
    }
    parsed
}

/// RFC 3339 with offset, or a bare local timestamp read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// An activity with its denormalized host. `distanceMeters` is only set on
/// feed results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub host: Option<HostSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedActivity {
    #[serde(flatten)]
    pub activity: Activity,
    pub chat_channel_id: Option<String>,
}

pub async fn create_activity(
    pool: &SqlitePool,
    collaborators: &Collaborators,
    host_id: &str,
    request: CreateActivityRequest,
) -> Result<CreatedActivity, ActivityError> {
    let fields = request.validate()?;
    let activity_id = Uuid::new_v4().to_string();
    let membership_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    activity_repo::insert_activity(
        &mut *tx,
        &NewActivity {
            activity_id: &activity_id,
            title: &fields.title,
            description: &fields.description,
            address: &fields.address,
            location: fields.location,
            start_time: fields.start_time,
            end_time: fields.end_time,
            max_participants: fields.max_participants,
            host_id,
            created_at: now,
        },
    )
    .await?;

    let host_membership = NewMembership {
        membership_id: &membership_id,
        user_id: host_id,
        activity_id: &activity_id,
        role: MembershipRole::Host,
        joined_at: now,
    };
    let created = membership_repo::try_create(&mut *tx, &host_membership).await?;
    if let TryCreate::AlreadyMember = created {
        return Err(ActivityError::Database(sqlx::Error::Protocol(format!(
            "host membership for new activity {} already present",
            activity_id
        ))));
    }

    // The host holds a seat, so a single-seat activity starts out full.
    activity_repo::mark_full_if_at_capacity(&mut *tx, &activity_id).await?;

    let row = activity_repo::load_by_id(&mut *tx, &activity_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    tx.commit().await?;

    info!(activity_id = %activity_id, host_id, status = %row.status, "Activity created");

    let activity = Activity::try_from(row)?;
    let chat_channel_id = open_chat_channel(pool, collaborators, &activity).await;

    Ok(CreatedActivity {
        activity,
        chat_channel_id,
    })
}

// The activity is already committed; nothing here may fail the creation.
async fn open_chat_channel(
    pool: &SqlitePool,
    collaborators: &Collaborators,
    activity: &Activity,
) -> Option<String> {
    let created = bounded(
        collaborators.chat_timeout,
        collaborators
            .chat
            .create_channel(&activity.id, &activity.title, &activity.host_id),
    )
    .await;

    let channel_id = match created {
        Ok(channel_id) => channel_id,
        Err(e) => {
            warn!(activity_id = %activity.id, "Chat channel creation failed: {}", e);
            return None;
        }
    };

    match activity_chat_repo::insert_channel(pool, &activity.id, &channel_id, Utc::now()).await {
        Ok(_) => Some(channel_id),
        Err(e) => {
            warn!(activity_id = %activity.id, "Could not store chat channel reference: {}", e);
            None
        }
    }
}

pub async fn get_activity(
    pool: &SqlitePool,
    users: &dyn UserDirectory,
    activity_id: &str,
) -> Result<ActivityView, ActivityError> {
    let row = activity_repo::load_by_id(pool, activity_id)
        .await?
        .ok_or(ActivityError::NotFound)?;
    let activity = Activity::try_from(row)?;
    let mut hosts = resolve_hosts(users, std::slice::from_ref(&activity.host_id)).await;
    let host = hosts.remove(&activity.host_id).flatten();

    Ok(ActivityView {
        activity,
        host,
        distance_meters: None,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyActivities {
    pub hosting: Vec<ActivityView>,
    pub participating: Vec<ActivityView>,
}

pub async fn my_activities(
    pool: &SqlitePool,
    users: &dyn UserDirectory,
    user_id: &str,
) -> Result<MyActivities, ActivityError> {
    let rows = membership_repo::list_by_user(pool, user_id, None).await?;
    let host_ids: Vec<String> = rows.iter().map(|r| r.activity.host_id.clone()).collect();
    let hosts = resolve_hosts(users, &host_ids).await;

    let mut mine = MyActivities {
        hosting: Vec::new(),
        participating: Vec::new(),
    };
    for row in rows {
        let role = MembershipRole::parse(&row.membership_role).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown membership role '{}'", row.membership_role).into())
        })?;
        let activity = Activity::try_from(row.activity)?;
        let view = ActivityView {
            host: hosts.get(&activity.host_id).cloned().flatten(),
            activity,
            distance_meters: None,
        };
        match role {
            MembershipRole::Host => mine.hosting.push(view),
            MembershipRole::Participant => mine.participating.push(view),
        }
    }

    Ok(mine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{insert_user, memory_pool};
    use crate::services::chat_service::fakes::RecordingChat;
    use crate::services::signup_service::join_activity;
    use crate::services::user_directory::fakes::FakeDirectory;
    use crate::services::user_directory::SqliteUserDirectory;
    use std::sync::Arc;
    use std::time::Duration;

    fn request() -> CreateActivityRequest {
        serde_json::from_value(serde_json::json!({
            "title": "Sunset run",
            "description": "5k along the Amstel",
            "location": [4.9041, 52.3676],
            "address": "Amstel 1, Amsterdam",
            "startTime": "2030-06-01T18:00:00Z",
            "endTime": "2030-06-01T22:00:00+02:00",
            "maxParticipants": 4
        }))
        .unwrap()
    }

    fn collaborators(chat: Arc<RecordingChat>, pool: &SqlitePool) -> Collaborators {
        Collaborators::new(
            chat,
            Arc::new(SqliteUserDirectory::new(pool.clone())),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        let fields = request().validate().unwrap();
        assert_eq!(fields.title, "Sunset run");
        assert_eq!(fields.location, GeoPoint::new(4.9041, 52.3676));
        assert_eq!(fields.max_participants, 4);
        assert_eq!(fields.end_time.to_rfc3339(), "2030-06-01T20:00:00+00:00");
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut req = request();
        req.end_time = Some("2030-06-01T17:00:00Z".to_string());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("endTime must be after startTime"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let req = CreateActivityRequest {
            title: Some("  ".to_string()),
            location: Some(vec![200.0, 10.0]),
            start_time: Some("tomorrow".to_string()),
            max_participants: Some(0),
            ..Default::default()
        };
        let message = req.validate().unwrap_err().to_string();
        for expected in [
            "title is required",
            "description is required",
            "address is required",
            "location must be a valid",
            "startTime must be an ISO-8601 timestamp",
            "endTime is required",
            "maxParticipants must be at least 1",
        ] {
            assert!(message.contains(expected), "missing '{expected}' in '{message}'");
        }
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let parsed = serde_json::from_value::<CreateActivityRequest>(serde_json::json!({
            "title": "x",
            "price": 10
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_timestamp_accepts_naive_as_utc() {
        let ts = parse_timestamp("2030-06-01T18:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2030-06-01T18:00:00+00:00");
        assert!(parse_timestamp("06/01/2030").is_none());
    }

    #[tokio::test]
    async fn test_create_persists_activity_host_and_channel() {
        let pool = memory_pool().await;
        let chat = Arc::new(RecordingChat::default());
        let created = create_activity(&pool, &collaborators(chat.clone(), &pool), "host-1", request())
            .await
            .unwrap();

        assert_eq!(created.activity.status, crate::models::ActivityStatus::Active);
        let channel = format!("activity-{}", created.activity.id);
        assert_eq!(created.chat_channel_id.as_deref(), Some(channel.as_str()));
        assert_eq!(
            chat.calls(),
            vec![format!("create_channel:{}:host-1", created.activity.id)]
        );

        let stored = activity_chat_repo::load_channel(&pool, &created.activity.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.channel_id, channel);

        let activity_id = created.activity.id.as_str();
        let members = membership_repo::list_by_user(&pool, "host-1", Some(activity_id))
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].membership_role, "host");
    }

    #[tokio::test]
    async fn test_create_survives_chat_failure() {
        let pool = memory_pool().await;
        let chat = Arc::new(RecordingChat::failing());
        let created = create_activity(&pool, &collaborators(chat.clone(), &pool), "host-1", request())
            .await
            .unwrap();

        assert!(created.chat_channel_id.is_none());
        assert_eq!(chat.calls().len(), 1);
        assert!(activity_chat_repo::load_channel(&pool, &created.activity.id)
            .await
            .unwrap()
            .is_none());

        let users = SqliteUserDirectory::new(pool.clone());
        let view = get_activity(&pool, &users, &created.activity.id).await.unwrap();
        assert_eq!(view.activity.title, "Sunset run");
        assert_eq!(
            membership_repo::count_by_activity(&pool, &created.activity.id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let pool = memory_pool().await;
        let chat = Arc::new(RecordingChat::default());
        let mut req = request();
        req.max_participants = Some(0);

        let err = create_activity(&pool, &collaborators(chat.clone(), &pool), "host-1", req)
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Validation(_)));
        assert!(chat.calls().is_empty());
        assert!(membership_repo::list_by_user(&pool, "host-1", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_single_seat_activity_starts_full() {
        let pool = memory_pool().await;
        let mut req = request();
        req.max_participants = Some(1);
        let created = create_activity(
            &pool,
            &collaborators(Arc::new(RecordingChat::default()), &pool),
            "host-1",
            req,
        )
        .await
        .unwrap();
        assert_eq!(created.activity.status, crate::models::ActivityStatus::Full);
    }

    #[tokio::test]
    async fn test_get_activity_not_found() {
        let pool = memory_pool().await;
        let users = SqliteUserDirectory::new(pool.clone());
        let err = get_activity(&pool, &users, "missing").await.unwrap_err();
        assert!(matches!(err, ActivityError::NotFound));
    }

    #[tokio::test]
    async fn test_get_activity_with_failing_directory_has_no_host() {
        let pool = memory_pool().await;
        let chat = Arc::new(RecordingChat::default());
        let created = create_activity(&pool, &collaborators(chat, &pool), "host-1", request())
            .await
            .unwrap();

        let users = FakeDirectory::with(&[], &["host-1"]);
        let view = get_activity(&pool, &users, &created.activity.id).await.unwrap();
        assert!(view.host.is_none());
    }

    #[tokio::test]
    async fn test_my_activities_partitions_by_role() {
        let pool = memory_pool().await;
        insert_user(&pool, "ann", "Ann").await;
        insert_user(&pool, "bob", "Bob").await;
        let collab = collaborators(Arc::new(RecordingChat::default()), &pool);

        let hosted = create_activity(&pool, &collab, "ann", request()).await.unwrap();
        let joined = create_activity(&pool, &collab, "bob", request()).await.unwrap();
        join_activity(&pool, &collab, &joined.activity.id, "ann")
            .await
            .unwrap();

        let mine = my_activities(&pool, collab.users.as_ref(), "ann").await.unwrap();
        let hosting: Vec<_> = mine.hosting.iter().map(|v| v.activity.id.clone()).collect();
        let participating: Vec<_> = mine
            .participating
            .iter()
            .map(|v| v.activity.id.clone())
            .collect();

        assert_eq!(hosting, vec![hosted.activity.id.clone()]);
        assert_eq!(participating, vec![joined.activity.id.clone()]);
        assert_eq!(mine.participating[0].host.as_ref().unwrap().name, "Bob");
        assert_eq!(mine.hosting[0].host.as_ref().unwrap().name, "Ann");
    }
}
