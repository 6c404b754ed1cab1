use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityChatRow {
    pub activity_id: String,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}
