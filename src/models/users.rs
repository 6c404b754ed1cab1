use serde::Serialize;

// Read model of the external profile store; only what host summaries need.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsersRow {
    pub user_id: String,
    pub name: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    pub name: String,
    pub profile_picture_url: Option<String>,
}

impl From<UsersRow> for HostSummary {
    fn from(row: UsersRow) -> Self {
        Self {
            name: row.name,
            profile_picture_url: row
                .profile_picture_url
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}
