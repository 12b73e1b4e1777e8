//! crates/dangdai_core/src/completion.rs
//!
//! End-of-quiz scoring: the percentage, the progress update sent to the store,
//! and the data the results screen shows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    AnsweredQuestion, ExerciseType, IncorrectItem, PostQuizWeakness, PreQuizWeakness,
    ProgressRecord, ProgressUpdate, QuizAttemptSummary,
};
use crate::ports::{PortResult, ProgressStore};
use crate::progress::{build_display_list, ProgressDisplayRow};
use crate::weakness::{weakness_summary, WeaknessChange};

/// Percentage of correct answers, rounded half up. An empty quiz scores 0.
pub fn score_percent(correct_count: u32, total_questions: u32) -> u8 {
    if total_questions == 0 {
        return 0;
    }
    let correct = u64::from(correct_count.min(total_questions));
    let total = u64::from(total_questions);
    // Integer round-half-up of correct * 100 / total.
    ((correct * 200 + total) / (total * 2)) as u8
}

/// Chapter ids carry the book in the hundreds: 212 is book 2, chapter 12.
pub fn chapter_number(chapter_id: i32) -> i32 {
    chapter_id % 100
}

pub fn book_number(chapter_id: i32) -> i32 {
    chapter_id / 100
}

pub fn build_progress_update(summary: &QuizAttemptSummary) -> ProgressUpdate {
    ProgressUpdate {
        chapter_id: summary.chapter_id,
        book_id: summary.book_id,
        exercise_type: summary.exercise_type,
        score: score_percent(summary.correct_count, summary.total_questions),
    }
}

/// Whole minutes since the quiz started, rounded; 0 if it never started.
pub fn quiz_duration_minutes(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match started_at {
        Some(start) => {
            let ms = (now - start).num_milliseconds().max(0) as f64;
            (ms / 60_000.0).round() as u32
        }
        None => 0,
    }
}

/// Answered questions whose answer differs from the key (trimmed,
/// case-insensitive). Unanswered questions are skipped.
pub fn incorrect_answers(questions: &[AnsweredQuestion]) -> Vec<IncorrectItem> {
    questions
        .iter()
        .enumerate()
        .filter_map(|(question_index, q)| {
            let user_answer = q.user_answer.as_ref()?;
            let correct =
                user_answer.trim().to_lowercase() == q.correct_answer.trim().to_lowercase();
            (!correct).then(|| IncorrectItem {
                question_index,
                question_text: q.question_text.clone(),
                user_answer: user_answer.clone(),
                correct_answer: q.correct_answer.clone(),
            })
        })
        .collect()
}

//=========================================================================================
// One-Shot Snapshot & Dispatch
//=========================================================================================

/// The progress update for one finished attempt, captured once.
///
/// The update is computed in `new` and never recomputed, and `dispatch`
/// sends it to the store at most once no matter how often it is called.
#[derive(Debug)]
pub struct CompletionSnapshot {
    summary: QuizAttemptSummary,
    update: ProgressUpdate,
    dispatched: AtomicBool,
}

impl CompletionSnapshot {
    pub fn new(summary: QuizAttemptSummary) -> Self {
        let update = build_progress_update(&summary);
        Self {
            summary,
            update,
            dispatched: AtomicBool::new(false),
        }
    }

    pub fn summary(&self) -> &QuizAttemptSummary {
        &self.summary
    }

    pub fn progress_update(&self) -> &ProgressUpdate {
        &self.update
    }

    pub fn score_percent(&self) -> u8 {
        self.update.score
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Sends the update unless an earlier call already claimed it.
    ///
    /// Returns `Ok(true)` when this call sent it. A failed send is not retried:
    /// the claim stays taken.
    pub async fn dispatch(&self, store: &dyn ProgressStore, user_id: Uuid) -> PortResult<bool> {
        if self.dispatched.swap(true, Ordering::AcqRel) {
            debug!(%user_id, chapter_id = self.update.chapter_id, "Progress update already dispatched");
            return Ok(false);
        }
        store.upsert_progress(user_id, &self.update).await?;
        info!(
            %user_id,
            chapter_id = self.update.chapter_id,
            exercise_type = %self.update.exercise_type,
            score = self.update.score,
            "Progress update dispatched"
        );
        Ok(true)
    }
}

//=========================================================================================
// Results Screen
//=========================================================================================

/// Everything the results screen renders for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReport {
    pub correct_count: u32,
    pub total_questions: u32,
    pub score_percent: u8,
    pub duration_minutes: u32,
    pub points_earned: u32,
    pub chapter_number: i32,
    pub exercise_type: ExerciseType,
    pub exercise_label: &'static str,
    pub progress: Vec<ProgressDisplayRow>,
    pub weakness_changes: Option<Vec<WeaknessChange>>,
    pub incorrect_items: Vec<IncorrectItem>,
}

/// Extra, optional inputs to the results screen.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs<'a> {
    pub pre_quiz: &'a [PreQuizWeakness],
    pub post_quiz: &'a [PostQuizWeakness],
    pub incorrect_items: Vec<IncorrectItem>,
}

impl CompletionReport {
    pub fn build(
        snapshot: &CompletionSnapshot,
        progress: &HashMap<ExerciseType, ProgressRecord>,
        inputs: ReportInputs<'_>,
    ) -> Self {
        let summary = snapshot.summary();
        Self {
            correct_count: summary.correct_count,
            total_questions: summary.total_questions,
            score_percent: snapshot.score_percent(),
            duration_minutes: summary.duration_minutes,
            points_earned: summary.points_earned,
            chapter_number: chapter_number(summary.chapter_id),
            exercise_type: summary.exercise_type,
            exercise_label: summary.exercise_type.label(),
            progress: build_display_list(progress, summary.exercise_type),
            weakness_changes: weakness_summary(inputs.pre_quiz, inputs.post_quiz),
            incorrect_items: inputs.incorrect_items,
        }
    }
}
