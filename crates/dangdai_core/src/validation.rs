//! crates/dangdai_core/src/validation.rs
//!
//! Local answer checking. Nothing here calls out to a model or a database:
//! fill-in-blank answers are compared exactly against the answer key
//! (case-insensitive, trimmed), and typed answers go through the pinyin
//! normalizer when needed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pinyin::normalize_pinyin;

/// The marker a sentence uses for each blank, e.g. `我___去___。`
pub const BLANK_MARKER: &str = "___";

/// Blank index → word the learner placed there. `None` or `""` means unfilled.
pub type BlankAnswerMap = BTreeMap<usize, Option<String>>;

//=========================================================================================
// Answer Keys
//=========================================================================================

/// Ordered correct answers, one per blank, index-aligned with the sentence.
///
/// The wire format is a plain comma-separated string with no escaping, so an
/// answer can never contain a literal comma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey(Vec<String>);

impl AnswerKey {
    /// Splits on `,` and trims each piece. Empty pieces are kept so indices
    /// stay aligned with the blanks even when the key is malformed.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split(',').map(|a| a.trim().to_string()).collect())
    }

    pub fn answers(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for AnswerKey {
    fn from(answers: Vec<String>) -> Self {
        Self(answers)
    }
}

//=========================================================================================
// Fill-in-the-Blank
//=========================================================================================

/// Returns one flag per answer in the key: true when the learner's word matches.
///
/// Missing, empty and whitespace-only blanks are simply incorrect.
pub fn validate_fill_in_blank(blank_answers: &BlankAnswerMap, key: &AnswerKey) -> Vec<bool> {
    key.answers()
        .iter()
        .enumerate()
        .map(|(index, correct)| match filled_value(blank_answers, index) {
            Some(user) => {
                let user = user.trim();
                !user.is_empty() && user.to_lowercase() == correct.trim().to_lowercase()
            }
            None => false,
        })
        .collect()
}

/// True when every blank in `0..total_blanks` holds a non-empty word.
pub fn all_blanks_filled(blank_answers: &BlankAnswerMap, total_blanks: usize) -> bool {
    (0..total_blanks).all(|index| filled_value(blank_answers, index).is_some())
}

fn filled_value(blank_answers: &BlankAnswerMap, index: usize) -> Option<&str> {
    blank_answers
        .get(&index)
        .and_then(|v| v.as_deref())
        .filter(|v| !v.is_empty())
}

/// A piece of a fill-in-blank sentence, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SentenceSegment {
    Text { content: String },
    Blank { index: usize },
}

/// Splits a sentence on `___` into text and blank segments.
///
/// Every marker produces exactly one blank, numbered left to right from zero;
/// empty text between adjacent markers is dropped. Blank `i` pairs with
/// `AnswerKey::answers()[i]`.
pub fn segment_sentence(sentence: &str) -> Vec<SentenceSegment> {
    let parts: Vec<&str> = sentence.split(BLANK_MARKER).collect();
    let last = parts.len() - 1;
    let mut segments = Vec::with_capacity(parts.len() * 2);

    for (i, part) in parts.into_iter().enumerate() {
        if !part.is_empty() {
            segments.push(SentenceSegment::Text {
                content: part.to_string(),
            });
        }
        if i < last {
            segments.push(SentenceSegment::Blank { index: i });
        }
    }
    segments
}

/// Number of blanks in a sentence.
pub fn blank_count(sentence: &str) -> usize {
    sentence.matches(BLANK_MARKER).count()
}

//=========================================================================================
// Other Local Checks
//=========================================================================================

/// Exact local match for sentence-level answers (dialogue completion,
/// sentence construction). Tiles may be joined with or without spaces, so all
/// whitespace is removed; case still matters.
pub fn answers_match_exactly(user_answer: &str, correct_answer: &str) -> bool {
    strip_whitespace(user_answer) == strip_whitespace(correct_answer)
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAnswerKind {
    Pinyin,
    Meaning,
}

/// Checks a typed answer. Pinyin compares tone marks and tone numbers as
/// equivalent; meanings compare trimmed and case-insensitively.
pub fn validate_text_answer(user_answer: &str, correct_answer: &str, kind: TextAnswerKind) -> bool {
    if user_answer.trim().is_empty() || correct_answer.trim().is_empty() {
        return false;
    }
    match kind {
        TextAnswerKind::Pinyin => normalize_pinyin(user_answer) == normalize_pinyin(correct_answer),
        TextAnswerKind::Meaning => {
            user_answer.trim().to_lowercase() == correct_answer.trim().to_lowercase()
        }
    }
}
