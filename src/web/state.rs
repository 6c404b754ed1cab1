use sqlx::SqlitePool;

use crate::services::Collaborators;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub collaborators: Collaborators,
}

impl AppState {
    pub fn new(pool: SqlitePool, collaborators: Collaborators) -> Self {
        Self {
            pool,
            collaborators,
        }
    }
}
