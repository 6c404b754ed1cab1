use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipsRow {
    pub membership_id: String,
    pub user_id: String,
    pub activity_id: String,
    pub role: String, // host|participant
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Host,
    Participant,
}

impl MembershipRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipRole::Host => "host",
            MembershipRole::Participant => "participant",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "host" => Some(MembershipRole::Host),
            "participant" => Some(MembershipRole::Participant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub activity_id: String,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<MembershipsRow> for Membership {
    type Error = sqlx::Error;

    fn try_from(row: MembershipsRow) -> Result<Self, Self::Error> {
        let role = MembershipRole::parse(&row.role).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown membership role '{}'", row.role).into())
        })?;
        Ok(Self {
            id: row.membership_id,
            user_id: row.user_id,
            activity_id: row.activity_id,
            role,
            joined_at: row.joined_at,
        })
    }
}
