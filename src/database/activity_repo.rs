use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;

use crate::database::db_time;
use crate::geo;
use crate::models::{ActivitiesRow, ActivityStatus, GeoPoint};

const SQL_INSERT_ACTIVITY: &str = r#"
INSERT INTO activities (
  activity_id,
  title,
  description,
  address,
  longitude,
  latitude,
  start_time,
  end_time,
  max_participants,
  host_id,
  status,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)
"#;

const SQL_INSERT_ACTIVITY_LOCATION: &str = r#"
INSERT INTO activity_locations (id, min_lat, max_lat, min_lon, max_lon)
VALUES (?1, ?2, ?2, ?3, ?3)
"#;

pub struct NewActivity<'a> {
    pub activity_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub address: &'a str,
    pub location: GeoPoint,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_participants: i64,
    pub host_id: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Writes the activity row and its spatial index entry. Run it inside a
/// transaction so both land together.
pub async fn insert_activity(
    conn: &mut SqliteConnection,
    activity: &NewActivity<'_>,
) -> sqlx::Result<()> {
    let res = sqlx::query(SQL_INSERT_ACTIVITY)
        .bind(activity.activity_id)
        .bind(activity.title)
        .bind(activity.description)
        .bind(activity.address)
        .bind(activity.location.longitude)
        .bind(activity.location.latitude)
        .bind(db_time(&activity.start_time))
        .bind(db_time(&activity.end_time))
        .bind(activity.max_participants)
        .bind(activity.host_id)
        .bind(db_time(&activity.created_at))
        .execute(&mut *conn)
        .await?;

    sqlx::query(SQL_INSERT_ACTIVITY_LOCATION)
        .bind(res.last_insert_rowid())
        .bind(activity.location.latitude)
        .bind(activity.location.longitude)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn create(pool: &SqlitePool, activity: &NewActivity<'_>) -> sqlx::Result<ActivitiesRow> {
    let mut tx = pool.begin().await?;
    insert_activity(&mut *tx, activity).await?;
    let row = load_by_id(&mut *tx, activity.activity_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    tx.commit().await?;
    Ok(row)
}

const SQL_LOAD_ACTIVITY: &str = r#"
SELECT
  id,
  activity_id,
  title,
  description,
  address,
  longitude,
  latitude,
  start_time,
  end_time,
  max_participants,
  host_id,
  status,
  created_at
FROM activities
WHERE activity_id = ?
LIMIT 1
"#;

pub async fn load_by_id<'e, E>(
    executor: E,
    activity_id: &str,
) -> sqlx::Result<Option<ActivitiesRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ActivitiesRow>(SQL_LOAD_ACTIVITY)
        .bind(activity_id)
        .fetch_optional(executor)
        .await
}

const SQL_SET_STATUS: &str = r#"
UPDATE activities
SET status = ?
WHERE activity_id = ?
"#;

/// Unconditional write. Returns the number of matched rows, so writing the
/// current value again still reports 1.
pub async fn set_status<'e, E>(
    executor: E,
    activity_id: &str,
    status: ActivityStatus,
) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_SET_STATUS)
        .bind(status.as_str())
        .bind(activity_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

const SQL_MARK_FULL_IF_AT_CAPACITY: &str = r#"
UPDATE activities
SET status = 'full'
WHERE activity_id = ?1
  AND status = 'active'
  AND (
    SELECT COUNT(*)
    FROM memberships m
    WHERE m.activity_id = ?1
  ) >= max_participants
"#;

pub async fn mark_full_if_at_capacity<'e, E>(executor: E, activity_id: &str) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_MARK_FULL_IF_AT_CAPACITY)
        .bind(activity_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected() > 0)
}

const SQL_LIST_NEAR_CANDIDATES: &str = r#"
SELECT
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
FROM activity_locations g
JOIN activities a
  ON a.id = g.id
WHERE g.min_lat <= ?1
  AND g.max_lat >= ?2
  AND g.min_lon <= ?3
  AND g.max_lon >= ?4
  AND a.status = 'active'
  AND a.start_time >= ?5
"#;

#[derive(Debug, Clone)]
pub struct NearbyActivityRow {
    pub row: ActivitiesRow,
    pub distance_m: f64,
}

/// Active, not-yet-started activities within `max_distance_m` of `point`,
/// nearest first, ties broken by start time.
pub async fn query_near(
    pool: &SqlitePool,
    point: GeoPoint,
    max_distance_m: f64,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<NearbyActivityRow>> {
    let now = db_time(&now);
    let mut seen = HashSet::new();
    let mut nearby = Vec::new();

    for bbox in geo::bounding_boxes(point, max_distance_m) {
        let candidates = sqlx::query_as::<_, ActivitiesRow>(SQL_LIST_NEAR_CANDIDATES)
            .bind(bbox.max_lat)
            .bind(bbox.min_lat)
            .bind(bbox.max_lon)
            .bind(bbox.min_lon)
            .bind(&now)
            .fetch_all(pool)
            .await?;

        for row in candidates {
            if !seen.insert(row.id) {
                continue;
            }
            let distance_m =
                geo::haversine_m(point, GeoPoint::new(row.longitude, row.latitude));
            if distance_m > max_distance_m {
                continue;
            }
            nearby.push(NearbyActivityRow { row, distance_m });
        }
    }

    nearby.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.row.start_time.cmp(&b.row.start_time))
    });

    Ok(nearby)
}

const SQL_EXPIRE_PAST: &str = r#"
UPDATE activities
SET status = 'expired'
WHERE status IN ('active', 'full')
  AND end_time < ?
"#;

pub async fn expire_past<'e, E>(executor: E, now: DateTime<Utc>) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_EXPIRE_PAST)
        .bind(db_time(&now))
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}
