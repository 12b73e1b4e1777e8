//! crates/dangdai_core/src/memory.rs
//!
//! An in-process `ProgressStore`. Used for local runs without a database and
//! by tests. Rows are merged with the same rule the Postgres adapter applies.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    ExerciseType, ProgressRecord, ProgressUpdate, QuestionResult, QuizAttemptRecord,
};
use crate::ports::{PortError, PortResult, ProgressStore};
use crate::progress::merge_attempt;

type ProgressKey = (Uuid, i32, ExerciseType);

#[derive(Default)]
struct Inner {
    progress: HashMap<ProgressKey, ProgressRecord>,
    // Insertion order is chronological.
    question_results: Vec<(Uuid, QuestionResult)>,
    upserts: Vec<(Uuid, ProgressUpdate)>,
    quiz_attempts: Vec<(Uuid, QuizAttemptRecord)>,
}

#[derive(Default)]
pub struct InMemoryProgressStore {
    inner: Mutex<Inner>,
}

impl InMemoryProgressStore {
    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PortError::Unexpected("progress store lock poisoned".to_string()))
    }

    /// Every upsert received so far, in arrival order.
    pub fn upserts(&self) -> Vec<(Uuid, ProgressUpdate)> {
        self.lock().map(|g| g.upserts.clone()).unwrap_or_default()
    }

    /// The user's saved attempts, oldest first.
    pub fn quiz_attempts(&self, user_id: Uuid) -> Vec<QuizAttemptRecord> {
        self.lock()
            .map(|g| {
                g.quiz_attempts
                    .iter()
                    .filter(|(user, _)| *user == user_id)
                    .map(|(_, a)| a.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn progress_for_chapter(
        &self,
        user_id: Uuid,
        chapter_id: i32,
    ) -> PortResult<Vec<ProgressRecord>> {
        let inner = self.lock()?;
        let mut rows: Vec<ProgressRecord> = inner
            .progress
            .iter()
            .filter(|((user, chapter, _), _)| *user == user_id && *chapter == chapter_id)
            .map(|(_, record)| record.clone())
            .collect();
        rows.sort_by_key(|r| r.exercise_type);
        Ok(rows)
    }

    async fn upsert_progress(&self, user_id: Uuid, update: &ProgressUpdate) -> PortResult<()> {
        let mut inner = self.lock()?;
        let key = (user_id, update.chapter_id, update.exercise_type);
        let merged = merge_attempt(
            inner.progress.get(&key),
            update.exercise_type,
            update.score,
            Utc::now(),
        );
        inner.progress.insert(key, merged);
        inner.upserts.push((user_id, update.clone()));
        Ok(())
    }

    async fn save_quiz_attempt(&self, user_id: Uuid, attempt: &QuizAttemptRecord) -> PortResult<()> {
        let mut inner = self.lock()?;
        let seen = inner
            .quiz_attempts
            .iter()
            .any(|(user, a)| *user == user_id && a.attempt_id == attempt.attempt_id);
        if !seen {
            inner.quiz_attempts.push((user_id, attempt.clone()));
        }
        Ok(())
    }

    async fn save_question_result(
        &self,
        user_id: Uuid,
        result: &QuestionResult,
    ) -> PortResult<()> {
        self.lock()?.question_results.push((user_id, result.clone()));
        Ok(())
    }

    async fn recent_incorrect_results(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<QuestionResult>> {
        let inner = self.lock()?;
        Ok(inner
            .question_results
            .iter()
            .rev()
            .filter(|(user, r)| *user == user_id && !r.correct)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
