use chrono::{DateTime, Utc};
use serde_json::json;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    models::{AuditAction, AuditLogEntry, AuthMethod, Guest, GuestSession, MagicLinkToken},
    services::{
        email::{MagicLinkEmail, MagicLinkMailer},
        metrics,
        token::{generate_token, hash_token, is_valid_token_format, token_prefix},
        AuthError, GuestAuthStore,
    },
    utils::{normalize_email, ClientInfo},
};

/// Attempts at drawing a fresh token before giving up on unique collisions.
const TOKEN_INSERT_ATTEMPTS: usize = 3;

/// Lifetimes and link settings for issued credentials.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_ttl_hours: i64,
    pub magic_link_ttl_minutes: i64,
    pub public_base_url: String,
}

/// A freshly created session. `session_token` is the raw cookie value and
/// is never persisted.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub guest: Guest,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MagicLinkIssued {
    pub guest_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

/// Guest resolved from a live session cookie.
#[derive(Debug, Clone)]
pub struct GuestContext {
    pub guest: Guest,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct GuestAuthService {
    store: Arc<dyn GuestAuthStore>,
    mailer: Arc<dyn MagicLinkMailer>,
    settings: AuthSettings,
}

impl GuestAuthService {
    pub fn new(
        store: Arc<dyn GuestAuthStore>,
        mailer: Arc<dyn MagicLinkMailer>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn GuestAuthStore> {
        &self.store
    }

    /// Log in a guest whose email is on the list with the email-matching
    /// method.
    #[instrument(skip(self, email, client), fields(ip = %client.ip_address))]
    pub async fn authenticate_by_email(
        &self,
        email: &str,
        client: &ClientInfo,
    ) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);

        let guest = match self
            .store
            .find_guest_by_email(&email, AuthMethod::EmailMatching)
            .await?
        {
            Some(guest) => guest,
            None => {
                metrics::record_attempt(AuthMethod::EmailMatching.as_str(), "not_found");
                tracing::info!("Email match failed: no guest configured for email matching");
                return Err(AuthError::GuestNotFound(AuthMethod::EmailMatching));
            }
        };

        let issued = self.create_session(guest, client).await?;

        self.audit(AuditLogEntry::for_guest(
            AuditAction::GuestLogin,
            issued.guest.id,
            json!({
                "auth_method": AuthMethod::EmailMatching.as_str(),
                "email": issued.guest.email,
                "ip_address": client.ip_address,
                "user_agent": client.user_agent,
            }),
        ))
        .await;

        metrics::record_attempt(AuthMethod::EmailMatching.as_str(), "success");
        tracing::info!(guest_id = %issued.guest.id, "Guest logged in by email match");

        Ok(issued)
    }

    /// Persist a single-use token for a magic-link guest and mail the link.
    ///
    /// A delivery failure is logged only; the token already exists and the
    /// guest may request another link.
    #[instrument(skip(self, email, client), fields(ip = %client.ip_address))]
    pub async fn request_magic_link(
        &self,
        email: &str,
        client: &ClientInfo,
    ) -> Result<MagicLinkIssued, AuthError> {
        let email = normalize_email(email);

        let guest = match self
            .store
            .find_guest_by_email(&email, AuthMethod::MagicLink)
            .await?
        {
            Some(guest) => guest,
            None => {
                metrics::record_attempt(AuthMethod::MagicLink.as_str(), "not_found");
                tracing::info!("Magic link request failed: no guest configured for magic links");
                return Err(AuthError::GuestNotFound(AuthMethod::MagicLink));
            }
        };

        let record = self.insert_fresh_token(guest.id, client).await?;

        self.audit(AuditLogEntry::for_guest(
            AuditAction::MagicLinkRequested,
            guest.id,
            json!({
                "email": guest.email,
                "ip_address": client.ip_address,
                "expires_at": record.expires_at.to_rfc3339(),
            }),
        ))
        .await;

        let link = format!(
            "{}/auth/guest-login/verify?token={}",
            self.settings.public_base_url, record.token
        );
        let message = MagicLinkEmail {
            to_email: guest.email.clone(),
            guest_name: guest.first_name.clone(),
            link,
            expires_in_minutes: self.settings.magic_link_ttl_minutes,
        };
        if let Err(e) = self.mailer.send_magic_link(&message).await {
            tracing::error!(guest_id = %guest.id, error = %e, "Magic link delivery failed");
        }

        metrics::record_magic_link_issued();
        tracing::info!(
            guest_id = %guest.id,
            token_prefix = %token_prefix(&record.token),
            "Magic link issued"
        );

        Ok(MagicLinkIssued {
            guest_id: guest.id,
            expires_at: record.expires_at,
            expires_in_seconds: self.settings.magic_link_ttl_minutes * 60,
        })
    }

    /// Exchange a magic-link token for a session.
    ///
    /// A used token reports `TokenUsed` even when it has also expired.
    #[instrument(skip(self, token, client), fields(ip = %client.ip_address))]
    pub async fn verify_magic_link(
        &self,
        token: Option<&str>,
        client: &ClientInfo,
    ) -> Result<IssuedSession, AuthError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let token = token.ok_or(AuthError::MissingToken)?;

        if !is_valid_token_format(token) {
            metrics::record_attempt(AuthMethod::MagicLink.as_str(), "invalid_token");
            return Err(AuthError::InvalidTokenFormat);
        }

        let record = match self.store.find_magic_link_token(token).await? {
            Some(record) => record,
            None => {
                metrics::record_attempt(AuthMethod::MagicLink.as_str(), "not_found");
                tracing::info!(token_prefix = %token_prefix(token), "Unknown magic link token");
                return Err(AuthError::TokenNotFound);
            }
        };

        let now = Utc::now();
        if record.used || record.is_expired_at(now) {
            return Err(self.reject_token(&record, now).await);
        }

        let guest = self
            .store
            .find_guest_by_id(record.guest_id)
            .await?
            .ok_or(AuthError::GuestMissing)?;

        // Marking the token used and creating the session commit together,
        // so a failed insert leaves the link usable.
        let (session, session_token) = self.new_session(guest.id, client);
        let consumed = match self
            .store
            .redeem_magic_link_token(record.id, now, &session)
            .await?
        {
            Some(consumed) => consumed,
            None => {
                // Lost the race; reload to report the precise reason.
                return match self.store.find_magic_link_token(token).await? {
                    Some(current) => Err(self.reject_token(&current, now).await),
                    None => Err(AuthError::TokenNotFound),
                };
            }
        };

        let issued = IssuedSession {
            guest,
            session_token,
            expires_at: session.expires_at,
        };

        self.audit(AuditLogEntry::for_guest(
            AuditAction::GuestLogin,
            issued.guest.id,
            json!({
                "auth_method": AuthMethod::MagicLink.as_str(),
                "email": issued.guest.email,
                "ip_address": client.ip_address,
                "user_agent": client.user_agent,
                "token_id": consumed.id,
            }),
        ))
        .await;

        metrics::record_attempt(AuthMethod::MagicLink.as_str(), "success");
        tracing::info!(guest_id = %issued.guest.id, "Guest logged in by magic link");

        Ok(issued)
    }

    /// Resolve a session cookie to its guest.
    #[instrument(skip_all)]
    pub async fn validate_session(&self, session_token: &str) -> Result<GuestContext, AuthError> {
        if session_token.is_empty() {
            return Err(AuthError::MissingSession);
        }

        let session = self
            .store
            .find_session_by_token_hash(&hash_token(session_token))
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if session.is_expired_at(Utc::now()) {
            tracing::debug!(session_id = %session.id, "Session expired");
            return Err(AuthError::InvalidSession);
        }

        let guest = self
            .store
            .find_guest_by_id(session.guest_id)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        Ok(GuestContext {
            guest,
            session_id: session.id,
            expires_at: session.expires_at,
        })
    }

    /// Delete the session behind a cookie, if any.
    #[instrument(skip_all)]
    pub async fn logout(&self, session_token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = session_token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let token_hash = hash_token(token);
        let session = self.store.find_session_by_token_hash(&token_hash).await?;
        let removed = self.store.delete_session_by_token_hash(&token_hash).await?;

        if let (true, Some(session)) = (removed, session) {
            self.audit(AuditLogEntry::for_guest(
                AuditAction::GuestLogout,
                session.guest_id,
                json!({ "session_id": session.id }),
            ))
            .await;
            tracing::info!(guest_id = %session.guest_id, "Guest logged out");
        }

        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.store.purge_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed = removed, "Purged expired guest sessions");
        }
        Ok(removed)
    }

    fn new_session(&self, guest_id: Uuid, client: &ClientInfo) -> (GuestSession, String) {
        let session_token = generate_token();
        let session = GuestSession::new(
            guest_id,
            &session_token,
            self.settings.session_ttl_hours,
            client,
        );
        (session, session_token)
    }

    async fn create_session(
        &self,
        guest: Guest,
        client: &ClientInfo,
    ) -> Result<IssuedSession, AuthError> {
        let (session, session_token) = self.new_session(guest.id, client);
        self.store.insert_session(&session).await?;

        Ok(IssuedSession {
            guest,
            session_token,
            expires_at: session.expires_at,
        })
    }

    async fn insert_fresh_token(
        &self,
        guest_id: Uuid,
        client: &ClientInfo,
    ) -> Result<MagicLinkToken, AuthError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let record = MagicLinkToken::new(
                guest_id,
                generate_token(),
                self.settings.magic_link_ttl_minutes,
                client,
            );
            match self.store.insert_magic_link_token(&record).await {
                Ok(()) => return Ok(record),
                Err(AppError::Conflict(_)) if attempts < TOKEN_INSERT_ATTEMPTS => {
                    tracing::warn!("Magic link token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn reject_token(&self, record: &MagicLinkToken, now: DateTime<Utc>) -> AuthError {
        let (err, details) = if record.used {
            (
                AuthError::TokenUsed,
                json!({
                    "reason": "token_already_used",
                    "token_id": record.id,
                    "used_at": record.used_at.map(|t| t.to_rfc3339()),
                }),
            )
        } else if record.is_expired_at(now) {
            (
                AuthError::TokenExpired,
                json!({
                    "reason": "token_expired",
                    "token_id": record.id,
                    "expires_at": record.expires_at.to_rfc3339(),
                    "attempted_at": now.to_rfc3339(),
                }),
            )
        } else {
            return AuthError::Internal(anyhow::anyhow!(
                "Magic link token {} could not be consumed",
                record.id
            ));
        };

        metrics::record_attempt(
            AuthMethod::MagicLink.as_str(),
            if record.used { "token_used" } else { "token_expired" },
        );
        self.audit(AuditLogEntry::for_guest(
            AuditAction::MagicLinkVerificationFailed,
            record.guest_id,
            details,
        ))
        .await;

        err
    }

    /// Audit writes never fail the request that triggered them.
    async fn audit(&self, entry: AuditLogEntry) {
        if let Err(e) = self.store.insert_audit_log(&entry).await {
            tracing::error!(action = %entry.action, error = %e, "Failed to write audit log");
        }
    }
}
