//! services/api/src/adapters/memory.rs
//!
//! An in-process `AuthService` for running the API without Postgres, and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dangdai_core::domain::{AuthSession, User};
use dangdai_core::ports::{
    check_credentials, check_password, normalize_email, AuthError, AuthResult, AuthService,
    PortError, PortResult,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::password::{hash_password, verify_password};

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

struct StoredUser {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(Default)]
struct Inner {
    // Keyed by normalized email.
    users: HashMap<String, StoredUser>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    resets: HashMap<String, (Uuid, DateTime<Utc>)>,
}

impl Inner {
    fn user_by_id(&self, user_id: Uuid) -> Option<&StoredUser> {
        self.users.values().find(|u| u.user_id == user_id)
    }

    fn user_by_id_mut(&mut self, user_id: Uuid) -> Option<&mut StoredUser> {
        self.users.values_mut().find(|u| u.user_id == user_id)
    }

    /// Drops sessions and reset tokens that can no longer be used.
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        self.resets.retain(|_, (_, expires_at)| *expires_at > now);
    }

    fn open_session(&mut self, user: User, ttl: Duration) -> AuthSession {
        let now = Utc::now();
        self.purge_expired(now);
        let id = Uuid::new_v4().to_string();
        let expires_at = now + ttl;
        self.sessions.insert(id.clone(), (user.user_id, expires_at));
        AuthSession {
            id,
            user,
            expires_at,
        }
    }
}

pub struct InMemoryAuthService {
    inner: Mutex<Inner>,
    session_ttl: Duration,
}

impl InMemoryAuthService {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            session_ttl,
        }
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PortError::Unexpected("auth store lock poisoned".to_string()))
    }

    /// The live reset token issued for `email`, if any. Each user holds at
    /// most one. There is no mailer in-process, so this is how a local run or
    /// a test gets the link.
    pub fn issued_reset_token(&self, email: &str) -> Option<String> {
        let inner = self.lock().ok()?;
        let user_id = inner.users.get(&normalize_email(email))?.user_id;
        inner
            .resets
            .iter()
            .find(|(_, (owner, _))| *owner == user_id)
            .map(|(token, _)| token.clone())
    }
}

#[async_trait]
impl AuthService for InMemoryAuthService {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        check_credentials(email, password)?;
        let hashed_password = hash_password(password)?;
        let email = normalize_email(email);

        let mut inner = self.lock()?;
        if inner.users.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.clone(),
        };
        inner.users.insert(
            email,
            StoredUser {
                user_id: user.user_id,
                email: user.email.clone(),
                hashed_password,
            },
        );
        info!(user_id = %user.user_id, "User signed up");
        Ok(inner.open_session(user, self.session_ttl))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let mut inner = self.lock()?;
        let stored = inner
            .users
            .get(&normalize_email(email))
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &stored.hashed_password)? {
            return Err(AuthError::InvalidCredentials);
        }
        let user = User {
            user_id: stored.user_id,
            email: stored.email.clone(),
        };
        Ok(inner.open_session(user, self.session_ttl))
    }

    async fn sign_out(&self, session_id: &str) -> AuthResult<()> {
        self.lock()?.sessions.remove(session_id);
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let mut inner = self.lock()?;
        let Some(user_id) = inner.users.get(&normalize_email(email)).map(|u| u.user_id) else {
            debug!("Password reset requested for an unknown email");
            return Ok(());
        };
        let now = Utc::now();
        inner.purge_expired(now);
        // A new link replaces any earlier one for the same user.
        inner.resets.retain(|_, (owner, _)| *owner != user_id);
        let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        inner.resets.insert(Uuid::new_v4().to_string(), (user_id, expires_at));
        info!(%user_id, "Password reset token issued");
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<AuthSession> {
        check_password(new_password)?;
        let hashed_password = hash_password(new_password)?;

        let mut inner = self.lock()?;
        let (user_id, expires_at) = inner
            .resets
            .remove(token)
            .ok_or(AuthError::InvalidResetToken)?;
        if expires_at <= Utc::now() {
            return Err(AuthError::InvalidResetToken);
        }
        let stored = inner
            .user_by_id_mut(user_id)
            .ok_or(AuthError::InvalidResetToken)?;
        stored.hashed_password = hashed_password;
        let user = User {
            user_id,
            email: stored.email.clone(),
        };
        info!(%user_id, "Password reset completed");
        Ok(inner.open_session(user, self.session_ttl))
    }

    async fn update_password(&self, user_id: Uuid, new_password: &str) -> AuthResult<()> {
        check_password(new_password)?;
        let current = {
            let inner = self.lock()?;
            inner
                .user_by_id(user_id)
                .map(|u| u.hashed_password.clone())
                .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?
        };
        if verify_password(new_password, &current)? {
            return Err(AuthError::SamePassword);
        }
        let hashed_password = hash_password(new_password)?;
        let mut inner = self.lock()?;
        if let Some(stored) = inner.user_by_id_mut(user_id) {
            stored.hashed_password = hashed_password;
        }
        Ok(())
    }

    async fn validate_session(&self, session_id: &str) -> AuthResult<User> {
        let inner = self.lock()?;
        let (user_id, expires_at) = inner
            .sessions
            .get(session_id)
            .copied()
            .ok_or(AuthError::SessionExpired)?;
        if expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }
        let stored = inner.user_by_id(user_id).ok_or(AuthError::SessionExpired)?;
        Ok(User {
            user_id,
            email: stored.email.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> InMemoryAuthService {
        InMemoryAuthService::new(Duration::days(30))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_with_normalized_email() {
        let auth = service();
        let session = auth.sign_up("Learner@Example.com ", "password1").await.unwrap();
        assert_eq!(session.user.email, "learner@example.com");

        let again = auth.sign_in("learner@example.com", "password1").await.unwrap();
        assert_eq!(again.user.user_id, session.user.user_id);
        assert_ne!(again.id, session.id);
    }

    #[tokio::test]
    async fn duplicate_and_invalid_sign_ups_are_rejected() {
        let auth = service();
        auth.sign_up("a@b.co", "password1").await.unwrap();
        assert!(matches!(auth.sign_up("A@B.CO", "password2").await, Err(AuthError::EmailTaken)));
        assert!(matches!(auth.sign_up("nobody", "password1").await, Err(AuthError::InvalidEmail)));
        assert!(matches!(auth.sign_up("c@d.co", "short").await, Err(AuthError::PasswordTooShort)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let auth = service();
        auth.sign_up("a@b.co", "password1").await.unwrap();
        assert!(matches!(auth.sign_in("a@b.co", "password2").await, Err(AuthError::InvalidCredentials)));
        assert!(matches!(auth.sign_in("x@y.co", "password1").await, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn sign_out_ends_the_session() {
        let auth = service();
        let session = auth.sign_up("a@b.co", "password1").await.unwrap();
        assert!(auth.validate_session(&session.id).await.is_ok());
        auth.sign_out(&session.id).await.unwrap();
        assert!(matches!(auth.validate_session(&session.id).await, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let auth = InMemoryAuthService::new(Duration::seconds(-1));
        let session = auth.sign_up("a@b.co", "password1").await.unwrap();
        assert!(matches!(auth.validate_session(&session.id).await, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn reset_tokens_are_single_use() {
        let auth = service();
        auth.sign_up("a@b.co", "password1").await.unwrap();
        auth.request_password_reset("a@b.co").await.unwrap();
        let token = auth.issued_reset_token("a@b.co").unwrap();

        let session = auth.reset_password(&token, "password2").await.unwrap();
        assert_eq!(session.user.email, "a@b.co");
        assert!(auth.sign_in("a@b.co", "password2").await.is_ok());
        assert!(matches!(
            auth.reset_password(&token, "password3").await,
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn reset_for_unknown_email_succeeds_silently() {
        let auth = service();
        assert!(auth.request_password_reset("ghost@b.co").await.is_ok());
        assert_eq!(auth.issued_reset_token("ghost@b.co"), None);
    }

    #[tokio::test]
    async fn update_password_rejects_the_current_one() {
        let auth = service();
        let session = auth.sign_up("a@b.co", "password1").await.unwrap();
        let user_id = session.user.user_id;
        assert!(matches!(
            auth.update_password(user_id, "password1").await,
            Err(AuthError::SamePassword)
        ));
        auth.update_password(user_id, "password2").await.unwrap();
        assert!(auth.sign_in("a@b.co", "password2").await.is_ok());
    }

    #[tokio::test]
    async fn a_new_reset_request_replaces_the_old_token() {
        let auth = service();
        auth.sign_up("a@b.co", "password1").await.unwrap();
        auth.request_password_reset("a@b.co").await.unwrap();
        let first = auth.issued_reset_token("a@b.co").unwrap();
        auth.request_password_reset("a@b.co").await.unwrap();
        let second = auth.issued_reset_token("a@b.co").unwrap();

        assert_ne!(first, second);
        assert_eq!(auth.lock().unwrap().resets.len(), 1);
        assert!(matches!(
            auth.reset_password(&first, "password2").await,
            Err(AuthError::InvalidResetToken)
        ));
        assert!(auth.reset_password(&second, "password2").await.is_ok());
    }

    #[tokio::test]
    async fn expired_sessions_are_purged_when_new_ones_open() {
        let auth = InMemoryAuthService::new(Duration::seconds(-1));
        auth.sign_up("a@b.co", "password1").await.unwrap();
        auth.sign_in("a@b.co", "password1").await.unwrap();
        auth.sign_in("a@b.co", "password1").await.unwrap();
        // Only the session opened last is left; it was already expired at birth.
        assert_eq!(auth.lock().unwrap().sessions.len(), 1);
    }
}
