use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::database::activity_repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryReport {
    pub expired: u64,
}

/// Moves activities that have ended to `expired`. Only the maintenance
/// binary calls this; the server never expires anything on its own.
pub async fn expire_finished(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<ExpiryReport> {
    let expired = activity_repo::expire_past(pool, now).await?;
    info!(expired, cutoff = %now, "Expired finished activities");
    Ok(ExpiryReport { expired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::activity_repo::NewActivity;
    use crate::database::testing::memory_pool;
    use crate::models::GeoPoint;
    use chrono::Duration;

    #[tokio::test]
    async fn test_expire_finished_reports_count() {
        let pool = memory_pool().await;
        let now = Utc::now();
        for (id, ends_in) in [("ended", -Duration::hours(1)), ("running", Duration::hours(1))] {
            activity_repo::create(
                &pool,
                &NewActivity {
                    activity_id: id,
                    title: "Walk",
                    description: "Around the block",
                    address: "Plein 1",
                    location: GeoPoint::new(5.12, 52.09),
                    start_time: now - Duration::hours(2),
                    end_time: now + ends_in,
                    max_participants: 4,
                    host_id: "h1",
                    created_at: now - Duration::days(1),
                },
            )
            .await
            .unwrap();
        }

        let report = expire_finished(&pool, now).await.unwrap();
        assert_eq!(report, ExpiryReport { expired: 1 });
        let running = activity_repo::load_by_id(&pool, "running").await.unwrap().unwrap();
        assert_eq!(running.status, "active");
    }
}
