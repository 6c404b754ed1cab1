use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivitiesRow {
    pub id: i64,
    pub activity_id: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub longitude: f64,
    pub latitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_participants: i64,
    pub host_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Full,
    Expired,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Full => "full",
            ActivityStatus::Expired => "expired",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "active" => Some(ActivityStatus::Active),
            "full" => Some(ActivityStatus::Full),
            "expired" => Some(ActivityStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Activity as returned to clients. `location` keeps the `[longitude, latitude]`
/// order used by the create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: [f64; 2],
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_participants: i64,
    pub host_id: String,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ActivitiesRow> for Activity {
    type Error = sqlx::Error;

    fn try_from(row: ActivitiesRow) -> Result<Self, Self::Error> {
        let status = ActivityStatus::parse(&row.status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown activity status '{}'", row.status).into())
        })?;
        Ok(Self {
            id: row.activity_id,
            title: row.title,
            description: row.description,
            address: row.address,
            location: [row.longitude, row.latitude],
            start_time: row.start_time,
            end_time: row.end_time,
            max_participants: row.max_participants,
            host_id: row.host_id,
            status,
            created_at: row.created_at,
        })
    }
}
