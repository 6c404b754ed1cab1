use sqlx::SqlitePool;

use crate::models::UsersRow;

const SQL_LOAD_USER: &str = r#"
SELECT
  user_id,
  name,
  profile_picture_url
FROM users
WHERE user_id = ?1
LIMIT 1
"#;

pub async fn load_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Option<UsersRow>> {
    sqlx::query_as::<_, UsersRow>(SQL_LOAD_USER)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
