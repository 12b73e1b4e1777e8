//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProgressStore` and `AuthService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dangdai_core::domain::{
    AuthSession, ProgressRecord, ProgressUpdate, QuestionResult, QuizAttemptRecord, User,
};
use dangdai_core::ports::{
    check_credentials, check_password, normalize_email, AuthError, AuthResult, AuthService,
    PortError, PortResult, ProgressStore,
};
use dangdai_core::progress::MASTERY_THRESHOLD;
use sqlx::{types::Json, FromRow, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::password::{hash_password, verify_password};

/// How long a password reset link stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProgressStore` and `AuthService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    session_ttl: Duration,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool, session_ttl: Duration) -> Self {
        Self { pool, session_ttl }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn create_auth_session(&self, user: User) -> PortResult<AuthSession> {
        let id = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.session_ttl;
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&id)
            .bind(user.user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(AuthSession {
            id,
            user,
            expires_at,
        })
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProgressRow {
    exercise_type: String,
    best_score: i16,
    attempts_count: i32,
    mastered_at: Option<DateTime<Utc>>,
}
impl ProgressRow {
    /// Rows with an exercise type this build does not know are skipped.
    fn to_domain(self) -> Option<ProgressRecord> {
        match self.exercise_type.parse() {
            Ok(exercise_type) => Some(ProgressRecord {
                exercise_type,
                best_score: self.best_score.clamp(0, 100) as u8,
                attempts_count: self.attempts_count.max(0) as u32,
                mastered_at: self.mastered_at,
            }),
            Err(e) => {
                warn!("Skipping progress row: {}", e);
                None
            }
        }
    }
}

#[derive(FromRow)]
struct QuestionResultRow {
    chapter_id: i32,
    book_id: i32,
    exercise_type: String,
    vocabulary_item: Option<String>,
    grammar_pattern: Option<String>,
    correct: bool,
    time_spent_ms: i64,
}
impl QuestionResultRow {
    fn to_domain(self) -> Option<QuestionResult> {
        match self.exercise_type.parse() {
            Ok(exercise_type) => Some(QuestionResult {
                chapter_id: self.chapter_id,
                book_id: self.book_id,
                exercise_type,
                vocabulary_item: self.vocabulary_item,
                grammar_pattern: self.grammar_pattern,
                correct: self.correct,
                time_spent_ms: self.time_spent_ms.max(0) as u64,
            }),
            Err(e) => {
                warn!("Skipping question result row: {}", e);
                None
            }
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn progress_for_chapter(
        &self,
        user_id: Uuid,
        chapter_id: i32,
    ) -> PortResult<Vec<ProgressRecord>> {
        let records = sqlx::query_as::<_, ProgressRow>(
            "SELECT exercise_type, best_score, attempts_count, mastered_at \
             FROM exercise_type_progress WHERE user_id = $1 AND chapter_id = $2",
        )
        .bind(user_id)
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().filter_map(|r| r.to_domain()).collect())
    }

    async fn upsert_progress(&self, user_id: Uuid, update: &ProgressUpdate) -> PortResult<()> {
        // Same rule as `dangdai_core::progress::merge_attempt`, done atomically in SQL.
        sqlx::query(
            "INSERT INTO exercise_type_progress \
                 (user_id, chapter_id, book_id, exercise_type, best_score, attempts_count, mastered_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 1, CASE WHEN $5 >= $6 THEN now() END, now()) \
             ON CONFLICT (user_id, chapter_id, exercise_type) DO UPDATE SET \
                 best_score = GREATEST(exercise_type_progress.best_score, EXCLUDED.best_score), \
                 attempts_count = exercise_type_progress.attempts_count + 1, \
                 mastered_at = CASE \
                     WHEN GREATEST(exercise_type_progress.best_score, EXCLUDED.best_score) >= $6 \
                     THEN COALESCE(exercise_type_progress.mastered_at, now()) \
                 END, \
                 book_id = EXCLUDED.book_id, \
                 updated_at = now()",
        )
        .bind(user_id)
        .bind(update.chapter_id)
        .bind(update.book_id)
        .bind(update.exercise_type.as_str())
        .bind(i16::from(update.score))
        .bind(i16::from(MASTERY_THRESHOLD))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_quiz_attempt(&self, user_id: Uuid, attempt: &QuizAttemptRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO quiz_attempts \
                 (attempt_id, user_id, chapter_id, book_id, exercise_type, score, total_questions, answers_json) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id, attempt_id) DO NOTHING",
        )
        .bind(attempt.attempt_id)
        .bind(user_id)
        .bind(attempt.chapter_id)
        .bind(attempt.book_id)
        .bind(attempt.exercise_type.as_str())
        .bind(i16::from(attempt.score))
        .bind(i32::try_from(attempt.total_questions).unwrap_or(i32::MAX))
        .bind(Json(&attempt.answers))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_question_result(
        &self,
        user_id: Uuid,
        result: &QuestionResult,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO question_results \
                 (user_id, chapter_id, book_id, exercise_type, vocabulary_item, grammar_pattern, correct, time_spent_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user_id)
        .bind(result.chapter_id)
        .bind(result.book_id)
        .bind(result.exercise_type.as_str())
        .bind(&result.vocabulary_item)
        .bind(&result.grammar_pattern)
        .bind(result.correct)
        .bind(i64::try_from(result.time_spent_ms).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn recent_incorrect_results(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<QuestionResult>> {
        let records = sqlx::query_as::<_, QuestionResultRow>(
            "SELECT chapter_id, book_id, exercise_type, vocabulary_item, grammar_pattern, correct, time_spent_ms \
             FROM question_results WHERE user_id = $1 AND NOT correct \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().filter_map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for DbAdapter {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        check_credentials(email, password)?;
        let hashed_password = hash_password(password)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO NOTHING RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(email))
        .bind(hashed_password)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(AuthError::EmailTaken)?;

        info!(user_id = %record.user_id, "User signed up");
        Ok(self.create_auth_session(record.to_domain()).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let creds = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &creds.hashed_password)? {
            return Err(AuthError::InvalidCredentials);
        }

        let user = User {
            user_id: creds.user_id,
            email: creds.email,
        };
        Ok(self.create_auth_session(user).await?)
    }

    async fn sign_out(&self, session_id: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT user_id, email FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        let Some(user) = user else {
            debug!("Password reset requested for an unknown email");
            return Ok(());
        };

        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO password_resets (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(user.user_id)
            .bind(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        // Delivering the link (email) is the mail service's job.
        info!(user_id = %user.user_id, "Password reset token issued");
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<AuthSession> {
        check_password(new_password)?;

        let hashed_password = hash_password(new_password)?;

        // Redeeming the token and changing the password succeed or fail together.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let user = sqlx::query_as::<_, UserRecord>(
            "DELETE FROM password_resets r USING users u \
             WHERE r.token = $1 AND r.user_id = u.user_id AND r.expires_at > now() \
             RETURNING u.user_id, u.email",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or(AuthError::InvalidResetToken)?;

        sqlx::query("UPDATE users SET hashed_password = $1 WHERE user_id = $2")
            .bind(hashed_password)
            .bind(user.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        info!(user_id = %user.user_id, "Password reset completed");
        Ok(self.create_auth_session(user.to_domain()).await?)
    }

    async fn update_password(&self, user_id: Uuid, new_password: &str) -> AuthResult<()> {
        check_password(new_password)?;

        let current: String = sqlx::query_scalar("SELECT hashed_password FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;

        if verify_password(new_password, &current)? {
            return Err(AuthError::SamePassword);
        }

        sqlx::query("UPDATE users SET hashed_password = $1 WHERE user_id = $2")
            .bind(hash_password(new_password)?)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_session(&self, session_id: &str) -> AuthResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.email FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(AuthError::SessionExpired)?;

        Ok(record.to_domain())
    }
}
