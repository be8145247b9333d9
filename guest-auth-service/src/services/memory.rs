//! In-process [`GuestAuthStore`] for local development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::store::GuestAuthStore;
use crate::models::{AuditLogEntry, AuthMethod, Group, Guest, GuestSession, MagicLinkToken};

#[derive(Default)]
struct Tables {
    groups: HashMap<Uuid, Group>,
    guests: HashMap<Uuid, Guest>,
    sessions: HashMap<Uuid, GuestSession>,
    magic_link_tokens: HashMap<Uuid, MagicLinkToken>,
    audit_logs: Vec<AuditLogEntry>,
}

/// All tables live behind one mutex, so each trait call is atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("In-memory store lock poisoned")))
    }

    pub fn insert_group(&self, group: &Group) -> Result<(), AppError> {
        self.lock()?.groups.insert(group.id, group.clone());
        Ok(())
    }

    /// Enforces the group foreign key and case-insensitive email uniqueness.
    pub fn insert_guest(&self, guest: &Guest) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if !tables.groups.contains_key(&guest.group_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Group {} does not exist",
                guest.group_id
            )));
        }
        let email = guest.email.to_lowercase();
        if tables.guests.values().any(|g| g.email.to_lowercase() == email) {
            return Err(AppError::Conflict(anyhow::anyhow!("Resource already exists")));
        }
        tables.guests.insert(guest.id, guest.clone());
        Ok(())
    }

    pub fn sessions_for_guest(&self, guest_id: Uuid) -> Result<Vec<GuestSession>, AppError> {
        let tables = self.lock()?;
        let mut sessions: Vec<_> = tables
            .sessions
            .values()
            .filter(|s| s.guest_id == guest_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    pub fn magic_link_tokens_for_guest(
        &self,
        guest_id: Uuid,
    ) -> Result<Vec<MagicLinkToken>, AppError> {
        let tables = self.lock()?;
        let mut tokens: Vec<_> = tables
            .magic_link_tokens
            .values()
            .filter(|t| t.guest_id == guest_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    /// Overwrite a token's expiry, e.g. to simulate time passing.
    pub fn set_magic_link_expiry(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        match tables.magic_link_tokens.values_mut().find(|t| t.token == token) {
            Some(record) => {
                record.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Overwrite the expiry of every session belonging to a guest.
    pub fn set_session_expiry(
        &self,
        guest_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let mut tables = self.lock()?;
        let mut changed = 0;
        for session in tables.sessions.values_mut().filter(|s| s.guest_id == guest_id) {
            session.expires_at = expires_at;
            changed += 1;
        }
        Ok(changed)
    }

    pub fn audit_logs(&self) -> Result<Vec<AuditLogEntry>, AppError> {
        Ok(self.lock()?.audit_logs.clone())
    }

    pub fn audit_logs_for(
        &self,
        action: &str,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        Ok(self
            .lock()?
            .audit_logs
            .iter()
            .filter(|e| e.action == action && e.entity_id == Some(entity_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GuestAuthStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn find_guest_by_email(
        &self,
        email: &str,
        method: AuthMethod,
    ) -> Result<Option<Guest>, AppError> {
        let email = email.to_lowercase();
        Ok(self
            .lock()?
            .guests
            .values()
            .find(|g| g.email.to_lowercase() == email && g.auth_method == method)
            .cloned())
    }

    async fn find_guest_by_id(&self, guest_id: Uuid) -> Result<Option<Guest>, AppError> {
        Ok(self.lock()?.guests.get(&guest_id).cloned())
    }

    async fn insert_session(&self, session: &GuestSession) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if !tables.guests.contains_key(&session.guest_id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "guest_sessions.guest_id references a missing guest"
            )));
        }
        if tables
            .sessions
            .values()
            .any(|s| s.token_hash == session.token_hash)
        {
            return Err(AppError::Conflict(anyhow::anyhow!("Resource already exists")));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<GuestSession>, AppError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.token_hash != token_hash);
        Ok(tables.sessions.len() < before)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn insert_magic_link_token(&self, token: &MagicLinkToken) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if tables
            .magic_link_tokens
            .values()
            .any(|t| t.token == token.token)
        {
            return Err(AppError::Conflict(anyhow::anyhow!("Resource already exists")));
        }
        tables.magic_link_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_magic_link_token(&self, token: &str) -> Result<Option<MagicLinkToken>, AppError> {
        Ok(self
            .lock()?
            .magic_link_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn redeem_magic_link_token(
        &self,
        token_id: Uuid,
        now: DateTime<Utc>,
        session: &GuestSession,
    ) -> Result<Option<MagicLinkToken>, AppError> {
        let mut tables = self.lock()?;
        // Session constraints are checked before the token is touched.
        if !tables.guests.contains_key(&session.guest_id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "guest_sessions.guest_id references a missing guest"
            )));
        }
        if tables
            .sessions
            .values()
            .any(|s| s.token_hash == session.token_hash)
        {
            return Err(AppError::Conflict(anyhow::anyhow!("Resource already exists")));
        }
        let redeemed = match tables.magic_link_tokens.get_mut(&token_id) {
            Some(record) if !record.used && !record.is_expired_at(now) => {
                record.used = true;
                record.used_at = Some(now);
                record.clone()
            }
            _ => return Ok(None),
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(Some(redeemed))
    }

    async fn insert_audit_log(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        self.lock()?.audit_logs.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ClientInfo;
    use chrono::Duration;

    fn seeded() -> (InMemoryStore, Guest) {
        let store = InMemoryStore::new();
        let group = Group::new("Test Family");
        store.insert_group(&group).unwrap();
        let guest = Guest::new(group.id, "Jane", "Doe", "jane@example.com", AuthMethod::MagicLink);
        store.insert_guest(&guest).unwrap();
        (store, guest)
    }

    #[tokio::test]
    async fn redeem_succeeds_once_and_creates_one_session() {
        let (store, guest) = seeded();
        let token = MagicLinkToken::new(guest.id, "ab".repeat(32), 15, &ClientInfo::unknown());
        store.insert_magic_link_token(&token).await.unwrap();

        let now = Utc::now();
        let first_session = GuestSession::new(guest.id, "first", 24, &ClientInfo::unknown());
        let first = store
            .redeem_magic_link_token(token.id, now, &first_session)
            .await
            .unwrap();
        assert!(first.as_ref().is_some_and(|t| t.used && t.used_at == Some(now)));

        let second_session = GuestSession::new(guest.id, "second", 24, &ClientInfo::unknown());
        assert!(store
            .redeem_magic_link_token(token.id, now, &second_session)
            .await
            .unwrap()
            .is_none());

        let sessions = store.sessions_for_guest(guest.id).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, first_session.id);
    }

    #[tokio::test]
    async fn redeem_refuses_expired_tokens() {
        let (store, guest) = seeded();
        let token = MagicLinkToken::new(guest.id, "cd".repeat(32), 15, &ClientInfo::unknown());
        store.insert_magic_link_token(&token).await.unwrap();

        let later = token.expires_at + Duration::seconds(1);
        let session = GuestSession::new(guest.id, "late", 24, &ClientInfo::unknown());
        assert!(store
            .redeem_magic_link_token(token.id, later, &session)
            .await
            .unwrap()
            .is_none());
        let stored = store.find_magic_link_token(&token.token).await.unwrap().unwrap();
        assert!(!stored.used);
        assert!(store.sessions_for_guest(guest.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_session_insert_leaves_token_unused() {
        let (store, guest) = seeded();
        let token = MagicLinkToken::new(guest.id, "0f".repeat(32), 15, &ClientInfo::unknown());
        store.insert_magic_link_token(&token).await.unwrap();

        let orphan = GuestSession::new(Uuid::new_v4(), "orphan", 24, &ClientInfo::unknown());
        assert!(store
            .redeem_magic_link_token(token.id, Utc::now(), &orphan)
            .await
            .is_err());
        let stored = store.find_magic_link_token(&token.token).await.unwrap().unwrap();
        assert!(!stored.used);
    }

    #[tokio::test]
    async fn duplicate_token_values_conflict() {
        let (store, guest) = seeded();
        let a = MagicLinkToken::new(guest.id, "ef".repeat(32), 15, &ClientInfo::unknown());
        let b = MagicLinkToken::new(guest.id, "ef".repeat(32), 15, &ClientInfo::unknown());
        store.insert_magic_link_token(&a).await.unwrap();
        assert!(matches!(
            store.insert_magic_link_token(&b).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn guest_emails_are_unique_case_insensitively() {
        let (store, guest) = seeded();
        let dup = Guest::new(guest.group_id, "J", "D", "JANE@EXAMPLE.COM", AuthMethod::EmailMatching);
        assert!(matches!(store.insert_guest(&dup), Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let (store, guest) = seeded();
        let live = GuestSession::new(guest.id, "live", 24, &ClientInfo::unknown());
        let mut stale = GuestSession::new(guest.id, "stale", 24, &ClientInfo::unknown());
        stale.expires_at = Utc::now() - Duration::minutes(1);
        store.insert_session(&live).await.unwrap();
        store.insert_session(&stale).await.unwrap();

        assert_eq!(store.purge_expired_sessions(Utc::now()).await.unwrap(), 1);
        let remaining = store.sessions_for_guest(guest.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id);
    }
}
