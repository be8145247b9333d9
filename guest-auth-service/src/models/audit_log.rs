//! Append-only audit trail of authentication events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    GuestLogin,
    GuestLogout,
    MagicLinkRequested,
    MagicLinkVerificationFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuestLogin => "guest_login",
            Self::GuestLogout => "guest_logout",
            Self::MagicLinkRequested => "magic_link_requested",
            Self::MagicLinkVerificationFailed => "magic_link_verification_failed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub actor: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Entry about a guest, attributed to that guest.
    pub fn for_guest(action: AuditAction, guest_id: Uuid, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.as_str().to_string(),
            entity_type: "guest".to_string(),
            entity_id: Some(guest_id),
            actor: Some(format!("guest:{}", guest_id)),
            details,
            created_at: Utc::now(),
        }
    }
}
