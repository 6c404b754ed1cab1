use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::user_repo;
use crate::models::HostSummary;

pub const DISPLAY_NAME_FALLBACK: &str = "User";

/// Read access to the profile store owned by the identity side.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn host_summary(&self, user_id: &str) -> sqlx::Result<Option<HostSummary>>;

    async fn display_name(&self, user_id: &str) -> sqlx::Result<Option<String>>;
}

#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn host_summary(&self, user_id: &str) -> sqlx::Result<Option<HostSummary>> {
        Ok(user_repo::load_user(&self.pool, user_id)
            .await?
            .map(HostSummary::from))
    }

    async fn display_name(&self, user_id: &str) -> sqlx::Result<Option<String>> {
        Ok(user_repo::load_user(&self.pool, user_id)
            .await?
            .map(|row| row.name.trim().to_string())
            .filter(|name| !name.is_empty()))
    }
}

pub async fn display_name_or_fallback(users: &dyn UserDirectory, user_id: &str) -> String {
    match users.display_name(user_id).await {
        Ok(Some(name)) => name,
        Ok(None) => DISPLAY_NAME_FALLBACK.to_string(),
        Err(e) => {
            warn!(user_id, "Display name lookup failed: {}", e);
            DISPLAY_NAME_FALLBACK.to_string()
        }
    }
}

/// Resolves each distinct host once. Failed or missing lookups map to `None`.
pub async fn resolve_hosts(
    users: &dyn UserDirectory,
    host_ids: &[String],
) -> HashMap<String, Option<HostSummary>> {
    let mut hosts: HashMap<String, Option<HostSummary>> = HashMap::new();
    for host_id in host_ids {
        if hosts.contains_key(host_id) {
            continue;
        }
        let summary = match users.host_summary(host_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(host_id = %host_id, "Host summary lookup failed: {}", e);
                None
            }
        };
        hosts.insert(host_id.clone(), summary);
    }
    hosts
}
