use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::ClientInfo;

/// Single-use login token mailed to a guest.
#[derive(Debug, Clone, FromRow)]
pub struct MagicLinkToken {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl MagicLinkToken {
    pub fn new(guest_id: Uuid, token: String, ttl_minutes: i64, client: &ClientInfo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            guest_id,
            token,
            expires_at: now + Duration::minutes(ttl_minutes),
            used: false,
            used_at: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
        }
    }

    /// Absolute comparison, no grace period.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
