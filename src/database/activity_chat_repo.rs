use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::db_time;
use crate::models::ActivityChatRow;

const SQL_INSERT_CHANNEL: &str = r#"
INSERT INTO activity_chats (activity_id, channel_id, created_at)
VALUES (?, ?, ?)
ON CONFLICT (activity_id) DO NOTHING
"#;

pub async fn insert_channel(
    pool: &SqlitePool,
    activity_id: &str,
    channel_id: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_INSERT_CHANNEL)
        .bind(activity_id)
        .bind(channel_id)
        .bind(db_time(&created_at))
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

const SQL_LOAD_CHANNEL: &str = r#"
SELECT
  activity_id,
  channel_id,
  created_at
FROM activity_chats
WHERE activity_id = ?1
LIMIT 1
"#;

pub async fn load_channel(
    pool: &SqlitePool,
    activity_id: &str,
) -> sqlx::Result<Option<ActivityChatRow>> {
    sqlx::query_as::<_, ActivityChatRow>(SQL_LOAD_CHANNEL)
        .bind(activity_id)
        .fetch_optional(pool)
        .await
}
