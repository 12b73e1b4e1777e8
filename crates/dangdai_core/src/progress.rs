//! crates/dangdai_core/src/progress.rs
//!
//! Mastery status per exercise type, and the merge rule a progress store
//! applies when an attempt is recorded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{ExerciseType, ProgressRecord};

/// Best score at or above which an exercise type counts as mastered.
pub const MASTERY_THRESHOLD: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    New,
    InProgress,
    Mastered,
}

/// Derives the status from a record, or its absence.
///
/// The score threshold is checked before the attempt count, so a record at or
/// above the threshold is mastered even with zero attempts.
pub fn classify(record: Option<&ProgressRecord>) -> ProgressStatus {
    match record {
        None => ProgressStatus::New,
        Some(r) if r.best_score >= MASTERY_THRESHOLD => ProgressStatus::Mastered,
        Some(r) if r.attempts_count > 0 => ProgressStatus::InProgress,
        Some(_) => ProgressStatus::New,
    }
}

/// One line of the per-chapter progress list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressDisplayRow {
    pub exercise_type: ExerciseType,
    pub label: &'static str,
    pub status: ProgressStatus,
    /// Bar fill in percent: the best score, or 0 for new types.
    pub display_value: u8,
    pub is_highlighted: bool,
}

/// Builds all seven rows in canonical order. Types without a record show as
/// new; exactly one row (the `highlight` type) is highlighted.
pub fn build_display_list(
    records: &HashMap<ExerciseType, ProgressRecord>,
    highlight: ExerciseType,
) -> Vec<ProgressDisplayRow> {
    ExerciseType::ALL
        .into_iter()
        .map(|exercise_type| {
            let record = records.get(&exercise_type);
            let status = classify(record);
            let display_value = match (status, record) {
                (ProgressStatus::New, _) | (_, None) => 0,
                (_, Some(r)) => r.best_score.min(100),
            };
            ProgressDisplayRow {
                exercise_type,
                label: exercise_type.label(),
                status,
                display_value,
                is_highlighted: exercise_type == highlight,
            }
        })
        .collect()
}

/// Keys store rows by exercise type. If a store returns duplicates, the last wins.
pub fn index_by_type(records: Vec<ProgressRecord>) -> HashMap<ExerciseType, ProgressRecord> {
    records.into_iter().map(|r| (r.exercise_type, r)).collect()
}

/// Applies one attempt's score to an existing row (or creates the row).
///
/// `attempts_count` goes up by one, `best_score` keeps the maximum, and
/// `mastered_at` is stamped the first time the best score reaches the
/// threshold and is never moved afterwards.
pub fn merge_attempt(
    existing: Option<&ProgressRecord>,
    exercise_type: ExerciseType,
    score: u8,
    now: DateTime<Utc>,
) -> ProgressRecord {
    let best_score = existing.map_or(score, |r| r.best_score.max(score));
    let attempts_count = existing.map_or(1, |r| r.attempts_count.saturating_add(1));
    let mastered_at = if best_score >= MASTERY_THRESHOLD {
        Some(existing.and_then(|r| r.mastered_at).unwrap_or(now))
    } else {
        None
    };
    ProgressRecord {
        exercise_type,
        best_score,
        attempts_count,
        mastered_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(t: ExerciseType, best_score: u8, attempts_count: u32) -> ProgressRecord {
        ProgressRecord {
            exercise_type: t,
            best_score,
            attempts_count,
            mastered_at: None,
        }
    }

    #[test]
    fn classifies_by_priority() {
        assert_eq!(classify(None), ProgressStatus::New);
        assert_eq!(classify(Some(&record(ExerciseType::Grammar, 80, 1))), ProgressStatus::Mastered);
        assert_eq!(classify(Some(&record(ExerciseType::Grammar, 79, 3))), ProgressStatus::InProgress);
        assert_eq!(classify(Some(&record(ExerciseType::Grammar, 0, 0))), ProgressStatus::New);
    }

    #[test]
    fn score_threshold_wins_over_zero_attempts() {
        let r = record(ExerciseType::Vocabulary, 85, 0);
        assert_eq!(classify(Some(&r)), ProgressStatus::Mastered);
    }

    #[test]
    fn mastered_at_is_not_trusted_for_status() {
        let mut r = record(ExerciseType::Matching, 40, 2);
        r.mastered_at = Some(Utc::now());
        assert_eq!(classify(Some(&r)), ProgressStatus::InProgress);
    }

    #[test]
    fn empty_records_give_seven_new_rows() {
        let rows = build_display_list(&HashMap::new(), ExerciseType::Matching);
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.status == ProgressStatus::New && r.display_value == 0));
        let order: Vec<ExerciseType> = rows.iter().map(|r| r.exercise_type).collect();
        assert_eq!(order, ExerciseType::ALL.to_vec());
    }

    #[test]
    fn exactly_one_row_is_highlighted() {
        let records = index_by_type(vec![record(ExerciseType::Grammar, 90, 2)]);
        let rows = build_display_list(&records, ExerciseType::ReadingComprehension);
        let highlighted: Vec<_> = rows.iter().filter(|r| r.is_highlighted).collect();
        assert_eq!(highlighted.len(), 1);
        assert_eq!(highlighted[0].exercise_type, ExerciseType::ReadingComprehension);
        assert_eq!(highlighted[0].status, ProgressStatus::New);
    }

    #[test]
    fn display_values_follow_best_score() {
        let records = index_by_type(vec![
            record(ExerciseType::Grammar, 90, 2),
            record(ExerciseType::Matching, 55, 1),
            record(ExerciseType::Vocabulary, 30, 0),
        ]);
        let rows = build_display_list(&records, ExerciseType::Matching);
        assert_eq!(rows[0].display_value, 0); // vocabulary: no attempts
        assert_eq!(rows[1].display_value, 90);
        assert_eq!(rows[3].display_value, 55);
        assert_eq!(rows[3].status, ProgressStatus::InProgress);
        assert_eq!(rows[3].label, "Matching");
    }

    #[test]
    fn merge_creates_then_accumulates() {
        let now = Utc::now();
        let first = merge_attempt(None, ExerciseType::Matching, 60, now);
        assert_eq!((first.best_score, first.attempts_count, first.mastered_at), (60, 1, None));

        let second = merge_attempt(Some(&first), ExerciseType::Matching, 40, now);
        assert_eq!((second.best_score, second.attempts_count), (60, 2));
    }

    #[test]
    fn merge_stamps_mastery_once() {
        let first_time = Utc::now();
        let mastered = merge_attempt(None, ExerciseType::Grammar, 85, first_time);
        assert_eq!(mastered.mastered_at, Some(first_time));

        let later = merge_attempt(
            Some(&mastered),
            ExerciseType::Grammar,
            100,
            first_time + Duration::days(3),
        );
        assert_eq!(later.best_score, 100);
        assert_eq!(later.mastered_at, Some(first_time));
    }
}
