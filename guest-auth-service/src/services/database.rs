//! PostgreSQL implementation of [`GuestAuthStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::store::GuestAuthStore;
use crate::models::{AuditLogEntry, AuthMethod, Group, Guest, GuestSession, MagicLinkToken};

const GUEST_COLUMNS: &str =
    "id, group_id, first_name, last_name, email, auth_method, created_at";
const SESSION_COLUMNS: &str =
    "id, guest_id, token_hash, expires_at, ip_address, user_agent, created_at";
const TOKEN_COLUMNS: &str =
    "id, guest_id, token, expires_at, used, used_at, ip_address, user_agent, created_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "guest-auth-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Guest list seeding (administrative tooling and tests)
    // -------------------------------------------------------------------------

    #[instrument(skip(self, group), fields(group_id = %group.id))]
    pub async fn insert_group(&self, group: &Group) -> Result<(), AppError> {
        sqlx::query("INSERT INTO groups (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(group.id)
            .bind(&group.name)
            .bind(group.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, guest), fields(guest_id = %guest.id))]
    pub async fn insert_guest(&self, guest: &Guest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO guests (id, group_id, first_name, last_name, email, auth_method, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(guest.id)
        .bind(guest.group_id)
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.email)
        .bind(guest.auth_method)
        .bind(guest.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GuestAuthStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, email), fields(method = %method))]
    async fn find_guest_by_email(
        &self,
        email: &str,
        method: AuthMethod,
    ) -> Result<Option<Guest>, AppError> {
        let sql = format!(
            "SELECT {} FROM guests WHERE lower(email) = lower($1) AND auth_method = $2",
            GUEST_COLUMNS
        );
        let guest = sqlx::query_as::<_, Guest>(&sql)
            .bind(email)
            .bind(method)
            .fetch_optional(&self.pool)
            .await?;
        Ok(guest)
    }

    #[instrument(skip(self))]
    async fn find_guest_by_id(&self, guest_id: Uuid) -> Result<Option<Guest>, AppError> {
        let sql = format!("SELECT {} FROM guests WHERE id = $1", GUEST_COLUMNS);
        let guest = sqlx::query_as::<_, Guest>(&sql)
            .bind(guest_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(guest)
    }

    #[instrument(skip(self, session), fields(guest_id = %session.guest_id))]
    async fn insert_session(&self, session: &GuestSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO guest_sessions (id, guest_id, token_hash, expires_at, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.guest_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<GuestSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM guest_sessions WHERE token_hash = $1",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, GuestSession>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    #[instrument(skip_all)]
    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM guest_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM guest_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, token), fields(guest_id = %token.guest_id))]
    async fn insert_magic_link_token(&self, token: &MagicLinkToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO magic_link_tokens (id, guest_id, token, expires_at, used, used_at, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(token.id)
        .bind(token.guest_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.used_at)
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_magic_link_token(&self, token: &str) -> Result<Option<MagicLinkToken>, AppError> {
        let sql = format!(
            "SELECT {} FROM magic_link_tokens WHERE token = $1",
            TOKEN_COLUMNS
        );
        let record = sqlx::query_as::<_, MagicLinkToken>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    #[instrument(skip(self, session), fields(guest_id = %session.guest_id))]
    async fn redeem_magic_link_token(
        &self,
        token_id: Uuid,
        now: DateTime<Utc>,
        session: &GuestSession,
    ) -> Result<Option<MagicLinkToken>, AppError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by UPDATE serialises concurrent verifiers; only
        // the first sees `used = false`.
        let sql = format!(
            r#"
            UPDATE magic_link_tokens
            SET used = true, used_at = $2
            WHERE id = $1 AND used = false AND expires_at >= $2
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        );
        let Some(record) = sqlx::query_as::<_, MagicLinkToken>(&sql)
            .bind(token_id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO guest_sessions (id, guest_id, token_hash, expires_at, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.guest_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    #[instrument(skip(self, entry), fields(action = %entry.action))]
    async fn insert_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, action, entity_type, entity_id, actor, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.actor)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
