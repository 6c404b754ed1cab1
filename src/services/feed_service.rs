use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::database::activity_repo;
use crate::error::ActivityError;
use crate::models::{Activity, GeoPoint};
use crate::services::activity_service::ActivityView;
use crate::services::user_directory::{resolve_hosts, UserDirectory};

pub const FEED_RADIUS_M: f64 = 50_000.0;

/// Raw query string of `GET /activities/feed`. Kept as text so that a bad
/// number is reported as invalid coordinates, not a query rejection.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl FeedQuery {
    pub fn point(&self) -> Result<GeoPoint, ActivityError> {
        parse_coordinates(self.lat.as_deref(), self.lon.as_deref())
    }
}

pub fn parse_coordinates(lat: Option<&str>, lon: Option<&str>) -> Result<GeoPoint, ActivityError> {
    let parse = |raw: Option<&str>| -> Option<f64> { raw?.trim().parse::<f64>().ok() };
    let (Some(latitude), Some(longitude)) = (parse(lat), parse(lon)) else {
        return Err(ActivityError::InvalidCoordinates);
    };
    let point = GeoPoint::new(longitude, latitude);
    if !point.is_valid() {
        return Err(ActivityError::InvalidCoordinates);
    }
    Ok(point)
}

pub async fn load_feed(
    pool: &SqlitePool,
    users: &dyn UserDirectory,
    point: GeoPoint,
) -> Result<Vec<ActivityView>, ActivityError> {
    let nearby = activity_repo::query_near(pool, point, FEED_RADIUS_M, Utc::now()).await?;
    let host_ids: Vec<String> = nearby.iter().map(|n| n.row.host_id.clone()).collect();
    let hosts = resolve_hosts(users, &host_ids).await;

    let mut feed = Vec::with_capacity(nearby.len());
    for item in nearby {
        let activity = Activity::try_from(item.row)?;
        feed.push(ActivityView {
            host: hosts.get(&activity.host_id).cloned().flatten(),
            activity,
            distance_meters: Some(item.distance_m.round()),
        });
    }
    Ok(feed)
}
