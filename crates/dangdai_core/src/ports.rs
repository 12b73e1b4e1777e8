//! crates/dangdai_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the collaborators the quiz engine
//! talks to. These traits form the boundary of the hexagonal architecture: the
//! engine never knows whether progress lives in Postgres or in memory.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthSession, ProgressRecord, ProgressUpdate, QuestionResult, QuizAttemptRecord, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Minimum accepted password length for sign-up and password changes.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Typed failures of the auth service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Please enter a valid email")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("New password must be different from your current password")]
    SamePassword,
    #[error("Please sign in again")]
    SessionExpired,
    #[error("This reset link is invalid or has expired")]
    InvalidResetToken,
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type AuthResult<T> = Result<T, AuthError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Returns every progress row the user has for a chapter, zero or more.
    async fn progress_for_chapter(
        &self,
        user_id: Uuid,
        chapter_id: i32,
    ) -> PortResult<Vec<ProgressRecord>>;

    /// Merges one finished attempt into the (user, chapter, exercise type) row.
    async fn upsert_progress(&self, user_id: Uuid, update: &ProgressUpdate) -> PortResult<()>;

    /// Appends a finished attempt to the user's history. Saving the same
    /// `attempt_id` twice keeps the first row.
    async fn save_quiz_attempt(&self, user_id: Uuid, attempt: &QuizAttemptRecord) -> PortResult<()>;

    // --- Per-question results ---
    async fn save_question_result(&self, user_id: Uuid, result: &QuestionResult)
        -> PortResult<()>;

    /// Newest-first incorrect results, at most `limit` rows.
    async fn recent_incorrect_results(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<QuestionResult>>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    async fn sign_out(&self, session_id: &str) -> AuthResult<()>;

    /// Starts the reset flow. Unknown emails succeed silently so the endpoint
    /// cannot be used to discover accounts.
    async fn request_password_reset(&self, email: &str) -> AuthResult<()>;

    /// Redeems a reset token, sets the new password and signs the user in.
    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<AuthSession>;

    async fn update_password(&self, user_id: Uuid, new_password: &str) -> AuthResult<()>;

    /// Resolves a live session id to its user, or `SessionExpired`.
    async fn validate_session(&self, session_id: &str) -> AuthResult<User>;
}

/// Shared input checks for sign-up and password changes.
pub fn check_credentials(email: &str, password: &str) -> AuthResult<()> {
    let email = email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid_email {
        return Err(AuthError::InvalidEmail);
    }
    check_password(password)
}

/// Emails are stored and looked up trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn check_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_emails() {
        assert!(matches!(check_credentials("nobody", "longenough"), Err(AuthError::InvalidEmail)));
        assert!(matches!(check_credentials("@x.com", "longenough"), Err(AuthError::InvalidEmail)));
        assert!(matches!(check_credentials("a@localhost", "longenough"), Err(AuthError::InvalidEmail)));
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(matches!(check_credentials("a@b.tw", "short"), Err(AuthError::PasswordTooShort)));
        assert!(check_credentials(" a@b.tw ", "12345678").is_ok());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Learner@Example.COM "), "learner@example.com");
    }

    #[test]
    fn password_length_counts_characters_not_bytes() {
        assert!(matches!(check_password("學中文好"), Err(AuthError::PasswordTooShort)));
        assert!(check_password("我每天學中文八個").is_ok());
    }
}
