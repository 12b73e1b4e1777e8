//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the quiz and progress REST endpoints and the
//! master definition for the OpenAPI specification.

use crate::web::{
    auth,
    state::{AppState, CompletedAttempt},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use dangdai_core::completion::{incorrect_answers, quiz_duration_minutes, CompletionSnapshot};
use dangdai_core::domain::{
    AnsweredQuestion, ExerciseType, PostQuizWeakness, PreQuizWeakness, QuestionResult,
    QuizAttemptRecord, QuizAttemptSummary, User,
};
use dangdai_core::progress::{build_display_list, index_by_type, ProgressDisplayRow};
use dangdai_core::validation::{
    all_blanks_filled, blank_count, segment_sentence, validate_fill_in_blank,
    validate_text_answer, AnswerKey, BlankAnswerMap, SentenceSegment, TextAnswerKind,
};
use dangdai_core::{CompletionReport, ReportInputs, WeaknessProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// How many recent misses the weakness profile looks at.
const WEAKNESS_WINDOW: usize = 100;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        validate_fill_in_blank_handler,
        validate_text_answer_handler,
        save_question_result_handler,
        complete_quiz_handler,
        chapter_progress_handler,
        weakness_profile_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::password_reset_handler,
        auth::password_reset_confirm_handler,
        auth::update_password_handler,
    ),
    components(
        schemas(
            HealthResponse,
            FillInBlankRequest,
            FillInBlankResponse,
            TextAnswerRequest,
            TextAnswerResponse,
            QuestionResultRequest,
            CompleteQuizRequest,
            CompleteQuizResponse,
            ChapterProgressResponse,
            WeaknessProfileResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::PasswordResetRequest,
            auth::PasswordResetConfirmRequest,
            auth::UpdatePasswordRequest,
            auth::AuthResponse,
        )
    ),
    tags(
        (name = "Dangdai Quiz API", description = "Quiz answer checking, scoring and chapter progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct FillInBlankRequest {
    /// Sentence with `___` marking each blank.
    pub sentence: String,
    /// Comma-separated correct words, one per blank.
    pub answer_key: String,
    /// Blank index to the placed word.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub blank_answers: BlankAnswerMap,
}

#[derive(Serialize, ToSchema)]
pub struct FillInBlankResponse {
    pub results: Vec<bool>,
    pub all_filled: bool,
    #[schema(value_type = Vec<Object>)]
    pub segments: Vec<SentenceSegment>,
}

#[derive(Deserialize, ToSchema)]
pub struct TextAnswerRequest {
    pub user_answer: String,
    pub correct_answer: String,
    /// `pinyin` or `meaning`.
    #[schema(value_type = String)]
    pub kind: TextAnswerKind,
}

#[derive(Serialize, ToSchema)]
pub struct TextAnswerResponse {
    pub correct: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct QuestionResultRequest {
    pub chapter_id: i32,
    pub book_id: i32,
    #[schema(value_type = String)]
    pub exercise_type: ExerciseType,
    pub vocabulary_item: Option<String>,
    pub grammar_pattern: Option<String>,
    pub correct: bool,
    #[serde(default)]
    pub time_spent_ms: u64,
}

impl From<QuestionResultRequest> for QuestionResult {
    fn from(req: QuestionResultRequest) -> Self {
        Self {
            chapter_id: req.chapter_id,
            book_id: req.book_id,
            exercise_type: req.exercise_type,
            vocabulary_item: req.vocabulary_item,
            grammar_pattern: req.grammar_pattern,
            correct: req.correct,
            time_spent_ms: req.time_spent_ms,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteQuizRequest {
    /// Client-generated id for this play-through; repeats reuse the first result.
    pub attempt_id: Uuid,
    pub chapter_id: i32,
    pub book_id: i32,
    #[schema(value_type = String)]
    pub exercise_type: ExerciseType,
    pub correct_count: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub points_earned: u32,
    /// Used when `duration_minutes` is not given.
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub pre_quiz_weaknesses: Vec<PreQuizWeakness>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub post_quiz_weaknesses: Vec<PostQuizWeakness>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub questions: Vec<AnsweredQuestion>,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteQuizResponse {
    pub attempt_id: Uuid,
    /// False when this attempt had already been completed.
    pub first_completion: bool,
    #[schema(value_type = Object)]
    pub report: CompletionReport,
}

#[derive(Deserialize)]
pub struct ProgressQuery {
    pub highlight: ExerciseType,
}

#[derive(Serialize, ToSchema)]
pub struct ChapterProgressResponse {
    pub chapter_id: i32,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<ProgressDisplayRow>,
}

#[derive(Serialize, ToSchema)]
pub struct WeaknessProfileResponse {
    #[schema(value_type = Vec<String>)]
    pub weak_exercise_types: Vec<ExerciseType>,
    pub weak_vocab: Vec<String>,
    pub weak_grammar: Vec<String>,
}

impl From<WeaknessProfile> for WeaknessProfileResponse {
    fn from(profile: WeaknessProfile) -> Self {
        Self {
            weak_exercise_types: profile.weak_exercise_types,
            weak_vocab: profile.weak_vocab,
            weak_grammar: profile.weak_grammar,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Check the words placed in a fill-in-the-blank sentence.
#[utoipa::path(
    post,
    path = "/quizzes/fill-in-blank/validate",
    request_body = FillInBlankRequest,
    responses((status = 200, description = "One result per answer in the key", body = FillInBlankResponse))
)]
pub async fn validate_fill_in_blank_handler(
    Json(req): Json<FillInBlankRequest>,
) -> impl IntoResponse {
    let key = AnswerKey::parse(&req.answer_key);
    Json(FillInBlankResponse {
        results: validate_fill_in_blank(&req.blank_answers, &key),
        all_filled: all_blanks_filled(&req.blank_answers, blank_count(&req.sentence)),
        segments: segment_sentence(&req.sentence),
    })
}

/// Check a typed pinyin or meaning answer.
#[utoipa::path(
    post,
    path = "/quizzes/text-answer/validate",
    request_body = TextAnswerRequest,
    responses((status = 200, description = "Whether the answer is correct", body = TextAnswerResponse))
)]
pub async fn validate_text_answer_handler(Json(req): Json<TextAnswerRequest>) -> impl IntoResponse {
    Json(TextAnswerResponse {
        correct: validate_text_answer(&req.user_answer, &req.correct_answer, req.kind),
    })
}

/// Record how the learner did on a single question.
#[utoipa::path(
    post,
    path = "/quizzes/question-results",
    request_body = QuestionResultRequest,
    responses(
        (status = 201, description = "Result stored"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn save_question_result_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<QuestionResultRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = QuestionResult::from(req);
    state
        .progress
        .save_question_result(user.user_id, &result)
        .await
        .map_err(|e| {
            error!("Failed to save question result: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save question result".to_string(),
            )
        })?;
    Ok(StatusCode::CREATED)
}

/// Finish a quiz: score it, record progress once, and build the results screen.
///
/// Everything the first request for an `attempt_id` carried is kept, and a
/// repeat is answered from it. The progress update and the attempt history
/// row are written at most once. A failed write is logged and does not fail
/// the request.
#[utoipa::path(
    post,
    path = "/quizzes/complete",
    request_body = CompleteQuizRequest,
    responses(
        (status = 200, description = "Results screen data", body = CompleteQuizResponse),
        (status = 400, description = "More correct answers than questions"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn complete_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CompleteQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let duration_minutes = req
        .duration_minutes
        .unwrap_or_else(|| quiz_duration_minutes(req.started_at, Utc::now()));
    let summary = QuizAttemptSummary {
        correct_count: req.correct_count,
        total_questions: req.total_questions,
        duration_minutes,
        points_earned: req.points_earned,
        chapter_id: req.chapter_id,
        book_id: req.book_id,
        exercise_type: req.exercise_type,
    };
    summary
        .check()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let attempt_id = req.attempt_id;
    let attempt = state
        .completed_attempt(user.user_id, attempt_id, || {
            CompletedAttempt::new(
                CompletionSnapshot::new(summary),
                req.questions,
                req.pre_quiz_weaknesses,
                req.post_quiz_weaknesses,
            )
        })
        .await;
    let snapshot = &attempt.snapshot;

    let first_completion = match snapshot.dispatch(state.progress.as_ref(), user.user_id).await {
        Ok(sent) => sent,
        Err(e) => {
            error!(%attempt_id, "Failed to record quiz progress: {:?}", e);
            true
        }
    };
    if first_completion {
        let summary = snapshot.summary();
        let record = QuizAttemptRecord {
            attempt_id,
            chapter_id: summary.chapter_id,
            book_id: summary.book_id,
            exercise_type: summary.exercise_type,
            score: snapshot.score_percent(),
            total_questions: summary.total_questions,
            answers: attempt.questions.clone(),
        };
        if let Err(e) = state.progress.save_quiz_attempt(user.user_id, &record).await {
            error!(%attempt_id, "Failed to save quiz attempt: {:?}", e);
        }
    } else {
        info!(%attempt_id, "Quiz completion repeated; reusing the first result");
    }

    let records = state
        .progress
        .progress_for_chapter(user.user_id, snapshot.summary().chapter_id)
        .await
        .map_err(|e| {
            error!("Failed to load chapter progress: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load chapter progress".to_string(),
            )
        })?;

    let report = CompletionReport::build(
        snapshot,
        &index_by_type(records),
        ReportInputs {
            pre_quiz: &attempt.pre_quiz,
            post_quiz: &attempt.post_quiz,
            incorrect_items: incorrect_answers(&attempt.questions),
        },
    );

    Ok(Json(CompleteQuizResponse {
        attempt_id,
        first_completion,
        report,
    }))
}

/// Per-exercise-type progress for one chapter, all seven types in order.
#[utoipa::path(
    get,
    path = "/chapters/{chapter_id}/progress",
    params(
        ("chapter_id" = i32, Path, description = "Chapter id, book * 100 + chapter"),
        ("highlight" = String, Query, description = "Exercise type to highlight")
    ),
    responses(
        (status = 200, description = "Progress list", body = ChapterProgressResponse),
        (status = 400, description = "Unknown exercise type"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn chapter_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chapter_id): Path<i32>,
    Query(query): Query<ProgressQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = state
        .progress
        .progress_for_chapter(user.user_id, chapter_id)
        .await
        .map_err(|e| {
            error!("Failed to load chapter progress: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load chapter progress".to_string(),
            )
        })?;

    Ok(Json(ChapterProgressResponse {
        chapter_id,
        rows: build_display_list(&index_by_type(records), query.highlight),
    }))
}

/// The learner's most-missed exercise types, words and grammar patterns.
#[utoipa::path(
    get,
    path = "/weakness-profile",
    responses(
        (status = 200, description = "Weak areas, most-missed first", body = WeaknessProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn weakness_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let results = state
        .progress
        .recent_incorrect_results(user.user_id, WEAKNESS_WINDOW)
        .await
        .map_err(|e| {
            error!("Failed to load question results: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load question results".to_string(),
            )
        })?;
    Ok(Json(WeaknessProfileResponse::from(
        WeaknessProfile::from_incorrect_results(&results),
    )))
}
