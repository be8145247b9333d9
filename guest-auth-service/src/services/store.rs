//! Storage seam for the authentication flows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{AuditLogEntry, AuthMethod, Guest, GuestSession, MagicLinkToken};

/// Persistence operations needed by [`GuestAuthService`](super::GuestAuthService).
///
/// Every operation is an insert, a select by unique key or a conditional
/// update, so implementations can stay free of business rules.
#[async_trait]
pub trait GuestAuthStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Case-insensitive lookup restricted to guests using `method`.
    async fn find_guest_by_email(
        &self,
        email: &str,
        method: AuthMethod,
    ) -> Result<Option<Guest>, AppError>;

    async fn find_guest_by_id(&self, guest_id: Uuid) -> Result<Option<Guest>, AppError>;

    async fn insert_session(&self, session: &GuestSession) -> Result<(), AppError>;

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<GuestSession>, AppError>;

    /// Returns whether a session was removed.
    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError>;

    /// Delete sessions with `expires_at < now`; returns the number removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Fails with `Conflict` if the token value already exists.
    async fn insert_magic_link_token(&self, token: &MagicLinkToken) -> Result<(), AppError>;

    async fn find_magic_link_token(&self, token: &str) -> Result<Option<MagicLinkToken>, AppError>;

    /// In one atomic step, flip `used` to true if the token is unused and
    /// not expired at `now`, and insert `session`. Returns the updated row
    /// only for the caller that won. On `None` or an error neither write is
    /// kept.
    async fn redeem_magic_link_token(
        &self,
        token_id: Uuid,
        now: DateTime<Utc>,
        session: &GuestSession,
    ) -> Result<Option<MagicLinkToken>, AppError>;

    async fn insert_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError>;
}
