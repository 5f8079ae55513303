use sqlx::{Executor, MySql};

use crate::model::user::User;

pub async fn find_by_username<'e, E>(exec: E, username: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(exec)
    .await
}

pub async fn insert<'e, E>(
    exec: E,
    username: &str,
    password_hash: &str,
    role_id: u8,
    employee_id: Option<u64>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        "INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(role_id)
    .bind(employee_id)
    .execute(exec)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn touch_last_login<'e, E>(exec: E, user_id: u64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user_id)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn store_refresh_token<'e, E>(
    exec: E,
    user_id: u64,
    jti: &str,
    expires_at: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(expires_at)
    .execute(exec)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: u64,
    pub user_id: u64,
    pub revoked: bool,
}

pub async fn refresh_token_for_update<'e, E>(
    exec: E,
    jti: &str,
) -> Result<Option<RefreshTokenRecord>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, RefreshTokenRecord>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(jti)
    .fetch_optional(exec)
    .await
}

pub async fn revoke_refresh_token<'e, E>(exec: E, jti: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(jti)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count<'e, E>(exec: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(exec)
        .await
}
