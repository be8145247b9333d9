//! Guest session model - one row per successful login.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::token::hash_token;
use crate::utils::ClientInfo;

/// Server-side session. Only the SHA-256 of the cookie value is stored.
#[derive(Debug, Clone, FromRow)]
pub struct GuestSession {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl GuestSession {
    /// Create a session for `guest_id` keyed by the raw cookie token.
    pub fn new(guest_id: Uuid, token: &str, ttl_hours: i64, client: &ClientInfo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            guest_id,
            token_hash: hash_token(token),
            expires_at: now + Duration::hours(ttl_hours),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
