//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use dangdai_core::completion::CompletionSnapshot;
use dangdai_core::domain::{AnsweredQuestion, PostQuizWeakness, PreQuizWeakness};
use dangdai_core::ports::{AuthService, ProgressStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How long a finished attempt is remembered for repeated completion requests.
pub const ATTEMPT_RETENTION_HOURS: i64 = 24;

//=========================================================================================
// CompletedAttempt (One Finished Play-Through)
//=========================================================================================

/// Everything the first completion request for an attempt carried. Repeats
/// of the same attempt are answered from here, never from the new body.
pub struct CompletedAttempt {
    pub snapshot: CompletionSnapshot,
    pub questions: Vec<AnsweredQuestion>,
    pub pre_quiz: Vec<PreQuizWeakness>,
    pub post_quiz: Vec<PostQuizWeakness>,
    recorded_at: DateTime<Utc>,
}

impl CompletedAttempt {
    pub fn new(
        snapshot: CompletionSnapshot,
        questions: Vec<AnsweredQuestion>,
        pre_quiz: Vec<PreQuizWeakness>,
        post_quiz: Vec<PostQuizWeakness>,
    ) -> Self {
        Self {
            snapshot,
            questions,
            pre_quiz,
            post_quiz,
            recorded_at: Utc::now(),
        }
    }
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub progress: Arc<dyn ProgressStore>,
    pub auth: Arc<dyn AuthService>,
    pub config: Arc<Config>,
    /// One entry per (user, client attempt id), so a repeated completion
    /// request reuses the first result instead of sending a second update.
    completions: RwLock<HashMap<(Uuid, Uuid), Arc<CompletedAttempt>>>,
}

impl AppState {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        auth: Arc<dyn AuthService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            progress,
            auth,
            config,
            completions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the attempt recorded for `(user_id, attempt_id)`, recording the
    /// one built by `first` if the attempt has not been seen in the retention
    /// window. Entries past the window are dropped on every insert.
    pub async fn completed_attempt(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        first: impl FnOnce() -> CompletedAttempt,
    ) -> Arc<CompletedAttempt> {
        let key = (user_id, attempt_id);
        if let Some(existing) = self.completions.read().await.get(&key) {
            return existing.clone();
        }

        let mut completions = self.completions.write().await;
        if let Some(existing) = completions.get(&key) {
            return existing.clone();
        }
        let attempt = Arc::new(first());
        let cutoff = attempt.recorded_at - Duration::hours(ATTEMPT_RETENTION_HOURS);
        completions.retain(|_, a| a.recorded_at > cutoff);
        completions.insert(key, attempt.clone());
        attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryAuthService, InMemoryProgressStore};
    use dangdai_core::domain::{ExerciseType, QuizAttemptSummary};

    fn state() -> AppState {
        AppState::new(
            Arc::new(InMemoryProgressStore::default()),
            Arc::new(InMemoryAuthService::new(Duration::days(30))),
            Arc::new(Config::from_lookup(|_| None).unwrap()),
        )
    }

    fn attempt(correct_count: u32, age: Duration) -> CompletedAttempt {
        let summary = QuizAttemptSummary {
            correct_count,
            total_questions: 10,
            duration_minutes: 3,
            points_earned: 0,
            chapter_id: 101,
            book_id: 1,
            exercise_type: ExerciseType::Vocabulary,
        };
        let mut attempt =
            CompletedAttempt::new(CompletionSnapshot::new(summary), Vec::new(), Vec::new(), Vec::new());
        attempt.recorded_at = attempt.recorded_at - age;
        attempt
    }

    #[tokio::test]
    async fn repeats_get_the_first_attempt() {
        let state = state();
        let (user, id) = (Uuid::new_v4(), Uuid::new_v4());
        let first = state.completed_attempt(user, id, || attempt(8, Duration::zero())).await;
        let again = state.completed_attempt(user, id, || attempt(2, Duration::zero())).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.snapshot.score_percent(), 80);
    }

    #[tokio::test]
    async fn attempt_ids_are_scoped_per_user() {
        let state = state();
        let id = Uuid::new_v4();
        let a = state.completed_attempt(Uuid::new_v4(), id, || attempt(8, Duration::zero())).await;
        let b = state.completed_attempt(Uuid::new_v4(), id, || attempt(2, Duration::zero())).await;
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn old_attempts_are_evicted_on_insert() {
        let state = state();
        let user = Uuid::new_v4();
        let stale = Uuid::new_v4();
        state
            .completed_attempt(user, stale, || attempt(8, Duration::hours(ATTEMPT_RETENTION_HOURS + 1)))
            .await;
        state
            .completed_attempt(user, Uuid::new_v4(), || attempt(8, Duration::hours(1)))
            .await;
        assert_eq!(state.completions.read().await.len(), 2);

        state
            .completed_attempt(user, Uuid::new_v4(), || attempt(5, Duration::zero()))
            .await;
        let completions = state.completions.read().await;
        assert_eq!(completions.len(), 2);
        assert!(!completions.contains_key(&(user, stale)));
    }
}
