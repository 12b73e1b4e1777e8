pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use auth::{
    login_handler, logout_handler, password_reset_confirm_handler, password_reset_handler,
    signup_handler, update_password_handler,
};
pub use middleware::require_auth;
use rest::{
    chapter_progress_handler, complete_quiz_handler, health_handler, save_question_result_handler,
    validate_fill_in_blank_handler, validate_text_answer_handler, weakness_profile_handler, ApiDoc,
};
use state::AppState;

/// Builds the full application router: public and protected API routes,
/// CORS for the configured client origin, request tracing and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/password-reset", post(password_reset_handler))
        .route(
            "/auth/password-reset/confirm",
            post(password_reset_confirm_handler),
        )
        .route(
            "/quizzes/fill-in-blank/validate",
            post(validate_fill_in_blank_handler),
        )
        .route(
            "/quizzes/text-answer/validate",
            post(validate_text_answer_handler),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/password", post(update_password_handler))
        .route("/quizzes/question-results", post(save_question_result_handler))
        .route("/quizzes/complete", post(complete_quiz_handler))
        .route("/chapters/{chapter_id}/progress", get(chapter_progress_handler))
        .route("/weakness-profile", get(weakness_profile_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
