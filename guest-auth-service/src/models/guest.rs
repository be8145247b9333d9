//! Guest and group entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a guest proves who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guest_auth_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Knowing the email on the guest list is enough.
    EmailMatching,
    /// A single-use link is mailed to the guest.
    MagicLink,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailMatching => "email_matching",
            Self::MagicLink => "magic_link",
        }
    }

    /// Human-readable name used in client-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmailMatching => "email matching",
            Self::MagicLink => "magic link",
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Household or party a guest belongs to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Invited guest. `email` is stored lowercase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub group_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub auth_method: AuthMethod,
    pub created_at: DateTime<Utc>,
}

impl Guest {
    pub fn new(
        group_id: Uuid,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: &str,
        auth_method: AuthMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.trim().to_lowercase(),
            auth_method,
            created_at: Utc::now(),
        }
    }
}
