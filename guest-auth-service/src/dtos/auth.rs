use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::AuthMethod;
use crate::services::{GuestContext, IssuedSession, MagicLinkIssued};

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Verification input from the query string or a request body. A missing
/// token is reported by the service, not by deserialization.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMatchResponse {
    pub guest_id: Uuid,
    pub group_id: Uuid,
}

impl From<&IssuedSession> for EmailMatchResponse {
    fn from(issued: &IssuedSession) -> Self {
        Self {
            guest_id: issued.guest.id,
            group_id: issued.guest.group_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkRequestResponse {
    pub message: String,
    /// Seconds until the link expires.
    pub expires_in: i64,
}

impl From<&MagicLinkIssued> for MagicLinkRequestResponse {
    fn from(issued: &MagicLinkIssued) -> Self {
        Self {
            message: "Magic link sent to your email".to_string(),
            expires_in: issued.expires_in_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkVerifyResponse {
    pub guest_id: Uuid,
    pub group_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl From<&IssuedSession> for MagicLinkVerifyResponse {
    fn from(issued: &IssuedSession) -> Self {
        Self {
            guest_id: issued.guest.id,
            group_id: issued.guest.group_id,
            first_name: issued.guest.first_name.clone(),
            last_name: issued.guest.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub guest_id: Uuid,
    pub group_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub auth_method: AuthMethod,
    pub expires_at: DateTime<Utc>,
}

impl From<&GuestContext> for SessionResponse {
    fn from(ctx: &GuestContext) -> Self {
        Self {
            guest_id: ctx.guest.id,
            group_id: ctx.guest.group_id,
            first_name: ctx.guest.first_name.clone(),
            last_name: ctx.guest.last_name.clone(),
            email: ctx.guest.email.clone(),
            auth_method: ctx.guest.auth_method,
            expires_at: ctx.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
