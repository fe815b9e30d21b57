use sqlx::PgPool;
use uuid::Uuid;
use chrono::Utc;
use crate::db::models::{User, UserSession};
use crate::error::AppError;
use sqlx::{Transaction, Postgres};
use std::sync::Arc;

pub(crate) const USER_COLUMNS: &str =
    "id, email, password_hash, display_name, role, is_active, created_at, updated_at, last_login";

#[derive(Clone)]
pub struct DbOperations {
    pub(crate) pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn get_pool_status(&self) -> Result<DbPoolStatus, AppError> {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        let active = size.saturating_sub(idle);

        Ok(DbPoolStatus {
            total_connections: size,
            active_connections: active,
            idle_connections: idle,
        })
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.display_name)
            .bind(user.role)
            .bind(user.is_active)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn record_login(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn create_session(&self, session: &UserSession) -> Result<UserSession, AppError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<UserSession>, AppError> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn update_session_activity(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
