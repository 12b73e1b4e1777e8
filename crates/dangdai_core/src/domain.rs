//! crates/dangdai_core/src/domain.rs
//!
//! Defines the core data structures for the quiz engine.
//! These are plain values: no database handles, no clocks, no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Exercise Types
//=========================================================================================

/// The closed set of exercise types a chapter can be practised with.
///
/// The declaration order is the canonical display order. Adding a variant means
/// updating `ALL`, `as_str` and `label` together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Vocabulary,
    Grammar,
    FillInBlank,
    Matching,
    DialogueCompletion,
    SentenceConstruction,
    ReadingComprehension,
}

impl ExerciseType {
    /// All exercise types in canonical display order.
    pub const ALL: [ExerciseType; 7] = [
        ExerciseType::Vocabulary,
        ExerciseType::Grammar,
        ExerciseType::FillInBlank,
        ExerciseType::Matching,
        ExerciseType::DialogueCompletion,
        ExerciseType::SentenceConstruction,
        ExerciseType::ReadingComprehension,
    ];

    /// The wire/storage name, e.g. `fill_in_blank`.
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::Vocabulary => "vocabulary",
            ExerciseType::Grammar => "grammar",
            ExerciseType::FillInBlank => "fill_in_blank",
            ExerciseType::Matching => "matching",
            ExerciseType::DialogueCompletion => "dialogue_completion",
            ExerciseType::SentenceConstruction => "sentence_construction",
            ExerciseType::ReadingComprehension => "reading_comprehension",
        }
    }

    /// Human-facing label shown on the results screen.
    pub fn label(self) -> &'static str {
        match self {
            ExerciseType::Vocabulary => "Vocabulary",
            ExerciseType::Grammar => "Grammar",
            ExerciseType::FillInBlank => "Fill-in-the-Blank",
            ExerciseType::Matching => "Matching",
            ExerciseType::DialogueCompletion => "Dialogue Completion",
            ExerciseType::SentenceConstruction => "Sentence Construction",
            ExerciseType::ReadingComprehension => "Reading Comprehension",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the seven exercise types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown exercise type: '{0}'")]
pub struct UnknownExerciseType(pub String);

impl FromStr for ExerciseType {
    type Err = UnknownExerciseType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExerciseType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownExerciseType(s.to_string()))
    }
}

//=========================================================================================
// Progress
//=========================================================================================

/// The best recorded outcome for one (chapter, exercise type) pair.
///
/// `mastered_at` is informational only; status is always derived from `best_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub exercise_type: ExerciseType,
    pub best_score: u8,
    pub attempts_count: u32,
    pub mastered_at: Option<DateTime<Utc>>,
}

/// The upsert request sent to the progress store when an attempt finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub chapter_id: i32,
    pub book_id: i32,
    pub exercise_type: ExerciseType,
    pub score: u8,
}

//=========================================================================================
// Quiz Attempts
//=========================================================================================

/// Aggregate outcome of one finished quiz, built when the last question is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttemptSummary {
    pub correct_count: u32,
    pub total_questions: u32,
    pub duration_minutes: u32,
    pub points_earned: u32,
    pub chapter_id: i32,
    pub book_id: i32,
    pub exercise_type: ExerciseType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("correct_count ({correct}) exceeds total_questions ({total})")]
pub struct InvalidAttempt {
    pub correct: u32,
    pub total: u32,
}

impl QuizAttemptSummary {
    /// Checks the `correct_count <= total_questions` invariant.
    pub fn check(&self) -> Result<(), InvalidAttempt> {
        if self.correct_count > self.total_questions {
            return Err(InvalidAttempt {
                correct: self.correct_count,
                total: self.total_questions,
            });
        }
        Ok(())
    }
}

/// The history row written once per finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttemptRecord {
    /// Client-generated id; a store keeps at most one row per attempt.
    pub attempt_id: Uuid,
    pub chapter_id: i32,
    pub book_id: i32,
    pub exercise_type: ExerciseType,
    pub score: u8,
    pub total_questions: u32,
    pub answers: Vec<AnsweredQuestion>,
}

/// Per-question performance row, written while the quiz is being played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub chapter_id: i32,
    pub book_id: i32,
    pub exercise_type: ExerciseType,
    pub vocabulary_item: Option<String>,
    pub grammar_pattern: Option<String>,
    pub correct: bool,
    pub time_spent_ms: u64,
}

/// A question as seen at the end of a quiz, used to list what the learner missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_text: String,
    pub user_answer: Option<String>,
    pub correct_answer: String,
}

/// A question the learner got wrong, for the "You struggled with" section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncorrectItem {
    pub question_index: usize,
    pub question_text: String,
    pub user_answer: String,
    pub correct_answer: String,
}

//=========================================================================================
// Weakness Snapshots
//=========================================================================================

/// Topic accuracy measured before the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreQuizWeakness {
    pub item: String,
    pub previous_accuracy: f64,
}

/// Topic accuracy measured after the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostQuizWeakness {
    pub item: String,
    pub current_accuracy: f64,
}

//=========================================================================================
// Users & Auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Represents a signed-in session (auth cookie)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub id: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exercise_types_round_trip_through_their_names() {
        for t in ExerciseType::ALL {
            assert_eq!(t.as_str().parse::<ExerciseType>(), Ok(t));
        }
    }

    #[test]
    fn unknown_exercise_type_is_rejected() {
        let err = "mixed".parse::<ExerciseType>().unwrap_err();
        assert_eq!(err, UnknownExerciseType("mixed".to_string()));
    }

    #[test]
    fn exercise_type_serializes_in_snake_case() {
        let json = serde_json::to_string(&ExerciseType::DialogueCompletion).unwrap();
        assert_eq!(json, "\"dialogue_completion\"");
    }

    #[test]
    fn canonical_order_has_seven_distinct_types() {
        let mut sorted = ExerciseType::ALL.to_vec();
        sorted.dedup();
        assert_eq!(sorted.len(), 7);
        assert_eq!(ExerciseType::ALL[2], ExerciseType::FillInBlank);
    }

    #[test]
    fn attempt_with_more_correct_than_total_fails_check() {
        let summary = QuizAttemptSummary {
            correct_count: 11,
            total_questions: 10,
            duration_minutes: 3,
            points_earned: 110,
            chapter_id: 212,
            book_id: 2,
            exercise_type: ExerciseType::Matching,
        };
        assert_eq!(summary.check(), Err(InvalidAttempt { correct: 11, total: 10 }));
    }
}
