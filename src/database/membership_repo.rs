use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::database::db_time;
use crate::models::{ActivitiesRow, MembershipRole, MembershipsRow};

pub struct NewMembership<'a> {
    pub membership_id: &'a str,
    pub user_id: &'a str,
    pub activity_id: &'a str,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum TryCreate {
    Created(MembershipsRow),
    AlreadyMember,
}

// The (user_id, activity_id) unique key decides; no read-before-write.
const SQL_TRY_CREATE: &str = r#"
INSERT INTO memberships (membership_id, user_id, activity_id, role, joined_at)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (user_id, activity_id) DO NOTHING
RETURNING membership_id, user_id, activity_id, role, joined_at
"#;

pub async fn try_create<'e, E>(
    executor: E,
    membership: &NewMembership<'_>,
) -> sqlx::Result<TryCreate>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, MembershipsRow>(SQL_TRY_CREATE)
        .bind(membership.membership_id)
        .bind(membership.user_id)
        .bind(membership.activity_id)
        .bind(membership.role.as_str())
        .bind(db_time(&membership.joined_at))
        .fetch_optional(executor)
        .await?;

    Ok(match row {
        Some(row) => TryCreate::Created(row),
        None => TryCreate::AlreadyMember,
    })
}

// Capacity admission in one statement: the row is only written while the
// activity is active and below its ceiling.
const SQL_INSERT_PARTICIPANT_IF_OPEN: &str = r#"
INSERT INTO memberships (membership_id, user_id, activity_id, role, joined_at)
SELECT ?1, ?2, a.activity_id, 'participant', ?4
FROM activities a
WHERE a.activity_id = ?3
  AND a.status = 'active'
  AND (
    SELECT COUNT(*)
    FROM memberships m
    WHERE m.activity_id = a.activity_id
  ) < a.max_participants
ON CONFLICT (user_id, activity_id) DO NOTHING
RETURNING membership_id, user_id, activity_id, role, joined_at
"#;

/// `None` means nothing was written: the activity is missing, not active,
/// at capacity, or the user is already a member.
pub async fn insert_participant_if_open<'e, E>(
    executor: E,
    membership_id: &str,
    user_id: &str,
    activity_id: &str,
    joined_at: DateTime<Utc>,
) -> sqlx::Result<Option<MembershipsRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, MembershipsRow>(SQL_INSERT_PARTICIPANT_IF_OPEN)
        .bind(membership_id)
        .bind(user_id)
        .bind(activity_id)
        .bind(db_time(&joined_at))
        .fetch_optional(executor)
        .await
}

const SQL_COUNT_BY_ACTIVITY: &str = r#"
SELECT COUNT(*)
FROM memberships
WHERE activity_id = ?
"#;

/// Counts every role; the host occupies a seat.
pub async fn count_by_activity<'e, E>(executor: E, activity_id: &str) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(SQL_COUNT_BY_ACTIVITY)
        .bind(activity_id)
        .fetch_one(executor)
        .await
}

const SQL_EXISTS: &str = r#"
SELECT EXISTS (
  SELECT 1
  FROM memberships
  WHERE user_id = ? AND activity_id = ?
)
"#;

pub async fn exists<'e, E>(executor: E, user_id: &str, activity_id: &str) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found = sqlx::query_scalar::<_, i64>(SQL_EXISTS)
        .bind(user_id)
        .bind(activity_id)
        .fetch_one(executor)
        .await?;
    Ok(found != 0)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserMembershipRow {
    pub membership_id: String,
    pub membership_role: String,
    pub joined_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub activity: ActivitiesRow,
}

const SQL_LIST_BY_USER: &str = r#"
SELECT
  m.membership_id,
  m.role AS membership_role,
  m.joined_at,
  a.id,
  a.activity_id,
  a.title,
  a.description,
  a.address,
  a.longitude,
  a.latitude,
  a.start_time,
  a.end_time,
  a.max_participants,
  a.host_id,
  a.status,
  a.created_at
FROM memberships m
JOIN activities a
  ON a.activity_id = m.activity_id
WHERE m.user_id = ?1
  AND (?2 IS NULL OR m.activity_id = ?2)
ORDER BY a.start_time ASC, a.activity_id ASC
"#;

pub async fn list_by_user<'e, E>(
    executor: E,
    user_id: &str,
    activity_filter: Option<&str>,
) -> sqlx::Result<Vec<UserMembershipRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, UserMembershipRow>(SQL_LIST_BY_USER)
        .bind(user_id)
        .bind(activity_filter)
        .fetch_all(executor)
        .await
}
