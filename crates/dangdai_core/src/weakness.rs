//! crates/dangdai_core/src/weakness.rs
//!
//! Before/after comparison of topic accuracy for the "Focus Areas Update"
//! section, and aggregation of past misses into a weakness profile.
//!
//! Messages are always encouraging: a decline reads "Keep practicing!".

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

use crate::domain::{ExerciseType, PostQuizWeakness, PreQuizWeakness, QuestionResult};

/// Accuracy change (in percentage points) beyond which a trend is reported.
pub const TREND_THRESHOLD: f64 = 5.0;

/// The profile keeps only the most-missed entries of each kind.
pub const MAX_WEAK_TYPES: usize = 3;
pub const MAX_WEAK_ITEMS: usize = 10;

pub const FIRST_ATTEMPT_MESSAGE: &str = "First attempt — keep going!";
pub const IMPROVING_MESSAGE: &str = "Getting stronger!";
pub const DECLINING_MESSAGE: &str = "Keep practicing!";
pub const STABLE_MESSAGE: &str = "Holding steady";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaknessChange {
    pub item: String,
    pub previous_accuracy: f64,
    pub current_accuracy: f64,
    pub trend: Trend,
    pub message: &'static str,
}

/// One change per post-quiz item, matched to pre-quiz data by exact `item`.
///
/// Pre-quiz items that were not measured again are dropped. An item with no
/// baseline is reported as stable with its current value echoed as the
/// previous one, rather than as a jump from 0%.
pub fn compute_changes(pre: &[PreQuizWeakness], post: &[PostQuizWeakness]) -> Vec<WeaknessChange> {
    post.iter()
        .map(|p| {
            let current = p.current_accuracy;
            let Some(baseline) = pre.iter().find(|b| b.item == p.item) else {
                return WeaknessChange {
                    item: p.item.clone(),
                    previous_accuracy: current,
                    current_accuracy: current,
                    trend: Trend::Stable,
                    message: FIRST_ATTEMPT_MESSAGE,
                };
            };

            let previous = baseline.previous_accuracy;
            let delta = current - previous;
            let (trend, message) = if delta > TREND_THRESHOLD {
                (Trend::Improving, IMPROVING_MESSAGE)
            } else if delta < -TREND_THRESHOLD {
                (Trend::Declining, DECLINING_MESSAGE)
            } else {
                (Trend::Stable, STABLE_MESSAGE)
            };

            WeaknessChange {
                item: p.item.clone(),
                previous_accuracy: previous,
                current_accuracy: current,
                trend,
                message,
            }
        })
        .collect()
}

/// The results-screen section: `None` means there is nothing to show, which
/// happens whenever either snapshot is empty.
pub fn weakness_summary(
    pre: &[PreQuizWeakness],
    post: &[PostQuizWeakness],
) -> Option<Vec<WeaknessChange>> {
    if pre.is_empty() || post.is_empty() {
        return None;
    }
    let changes = compute_changes(pre, post);
    (!changes.is_empty()).then_some(changes)
}

//=========================================================================================
// Weakness Profile
//=========================================================================================

/// Areas the learner misses most often, most-missed first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeaknessProfile {
    pub weak_exercise_types: Vec<ExerciseType>,
    pub weak_vocab: Vec<String>,
    pub weak_grammar: Vec<String>,
}

impl WeaknessProfile {
    /// Aggregates per-question results; correct answers are ignored.
    pub fn from_incorrect_results(results: &[QuestionResult]) -> Self {
        let misses = || results.iter().filter(|r| !r.correct);
        Self {
            weak_exercise_types: top(rank(misses().map(|r| r.exercise_type)), MAX_WEAK_TYPES),
            weak_vocab: top(
                rank(misses().filter_map(|r| non_empty(&r.vocabulary_item))),
                MAX_WEAK_ITEMS,
            ),
            weak_grammar: top(
                rank(misses().filter_map(|r| non_empty(&r.grammar_pattern))),
                MAX_WEAK_ITEMS,
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weak_exercise_types.is_empty() && self.weak_vocab.is_empty() && self.weak_grammar.is_empty()
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn top<T>(mut ranked: Vec<T>, max: usize) -> Vec<T> {
    ranked.truncate(max);
    ranked
}

/// Distinct values by descending count; ties keep first-seen order.
fn rank<T: Eq + Hash + Clone>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order: Vec<T> = Vec::new();
    for v in values {
        let count = counts.entry(v.clone()).or_insert(0);
        if *count == 0 {
            order.push(v);
        }
        *count += 1;
    }
    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre(item: &str, acc: f64) -> PreQuizWeakness {
        PreQuizWeakness { item: item.into(), previous_accuracy: acc }
    }

    fn post(item: &str, acc: f64) -> PostQuizWeakness {
        PostQuizWeakness { item: item.into(), current_accuracy: acc }
    }

    #[test]
    fn no_baseline_is_a_first_attempt() {
        let changes = compute_changes(&[], &[post("會 vs 可以", 80.0)]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].trend, Trend::Stable);
        assert_eq!(changes[0].message, "First attempt — keep going!");
        assert_eq!(changes[0].previous_accuracy, 80.0);
        assert_eq!(changes[0].current_accuracy, 80.0);
    }

    #[test]
    fn classifies_direction_by_delta() {
        let changes = compute_changes(
            &[pre("X", 60.0), pre("Y", 70.0), pre("Z", 50.0)],
            &[post("X", 80.0), post("Y", 50.0), post("Z", 55.0)],
        );
        assert_eq!(changes[0].trend, Trend::Improving);
        assert_eq!(changes[0].message, "Getting stronger!");
        assert_eq!(changes[0].previous_accuracy, 60.0);
        assert_eq!(changes[1].trend, Trend::Declining);
        assert_eq!(changes[1].message, "Keep practicing!");
        assert_eq!(changes[2].trend, Trend::Stable);
        assert_eq!(changes[2].message, "Holding steady");
    }

    #[test]
    fn threshold_edges_are_stable() {
        let changes = compute_changes(
            &[pre("up", 50.0), pre("down", 50.0)],
            &[post("up", 55.0), post("down", 45.0)],
        );
        assert!(changes.iter().all(|c| c.trend == Trend::Stable));
    }

    #[test]
    fn post_drives_iteration() {
        let changes = compute_changes(&[pre("only-before", 10.0)], &[post("after", 40.0)]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].item, "after");
        assert_eq!(changes[0].message, FIRST_ATTEMPT_MESSAGE);
    }

    #[test]
    fn item_match_is_exact() {
        let changes = compute_changes(&[pre("了", 20.0)], &[post("了 ", 90.0)]);
        assert_eq!(changes[0].trend, Trend::Stable);
        assert_eq!(changes[0].message, FIRST_ATTEMPT_MESSAGE);
    }

    #[test]
    fn summary_is_hidden_when_either_side_is_empty() {
        assert_eq!(weakness_summary(&[], &[post("X", 80.0)]), None);
        assert_eq!(weakness_summary(&[pre("X", 80.0)], &[]), None);
        assert_eq!(weakness_summary(&[pre("X", 60.0)], &[post("X", 80.0)]).map(|c| c.len()), Some(1));
    }

    fn miss(t: ExerciseType, vocab: Option<&str>, grammar: Option<&str>) -> QuestionResult {
        QuestionResult {
            chapter_id: 101,
            book_id: 1,
            exercise_type: t,
            vocabulary_item: vocab.map(str::to_string),
            grammar_pattern: grammar.map(str::to_string),
            correct: false,
            time_spent_ms: 1200,
        }
    }

    #[test]
    fn profile_ranks_most_missed_first() {
        let mut hit = miss(ExerciseType::Grammar, Some("想"), None);
        hit.correct = true;
        let results = vec![
            miss(ExerciseType::Vocabulary, Some("超市"), None),
            miss(ExerciseType::Matching, Some("想"), Some("會 vs 可以")),
            miss(ExerciseType::Matching, Some("想"), Some("")),
            hit.clone(),
            hit,
        ];
        let profile = WeaknessProfile::from_incorrect_results(&results);
        assert_eq!(profile.weak_exercise_types, vec![ExerciseType::Matching, ExerciseType::Vocabulary]);
        assert_eq!(profile.weak_vocab, vec!["想".to_string(), "超市".to_string()]);
        assert_eq!(profile.weak_grammar, vec!["會 vs 可以".to_string()]);
    }

    #[test]
    fn profile_keeps_only_the_most_missed() {
        let mut results: Vec<QuestionResult> = (0..15)
            .map(|i| {
                miss(
                    ExerciseType::ALL[i % ExerciseType::ALL.len()],
                    Some(format!("word-{i}").as_str()),
                    Some(format!("pattern-{i}").as_str()),
                )
            })
            .collect();
        results.push(miss(ExerciseType::Vocabulary, Some("word-14"), None));

        let profile = WeaknessProfile::from_incorrect_results(&results);
        assert_eq!(profile.weak_exercise_types.len(), MAX_WEAK_TYPES);
        assert_eq!(profile.weak_vocab.len(), MAX_WEAK_ITEMS);
        assert_eq!(profile.weak_grammar.len(), MAX_WEAK_ITEMS);
        // Vocabulary is missed four times; the other types tie at two.
        assert_eq!(
            profile.weak_exercise_types[..2],
            [ExerciseType::Vocabulary, ExerciseType::Grammar]
        );
        assert_eq!(profile.weak_vocab[0], "word-14");
        assert_eq!(profile.weak_grammar[0], "pattern-0");
    }

    #[test]
    fn profile_of_nothing_is_empty() {
        assert!(WeaknessProfile::from_incorrect_results(&[]).is_empty());
    }
}
