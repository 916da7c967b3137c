//! Debug endpoints for exercising the translation collaborator and
//! inspecting live relay state
//!
//! These endpoints are useful for development and operations without
//! requiring a WebSocket client or a running classroom.

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Request to test the translation service
#[derive(Debug, Deserialize)]
pub struct TestTranslationRequest {
    /// Source-language text to translate
    pub text: String,
}

/// Response from a translation test
#[derive(Debug, Serialize)]
pub struct TestTranslationResponse {
    pub success: bool,
    pub original: String,
    pub translated: String,
    /// True when the fallback fired and `translated` is the untranslated original
    pub degraded: bool,
    pub duration_ms: u64,
}

/// Test the external translation service end to end
///
/// POST /debug/test-translation
/// Body: {"text": "Günaydın"}
pub async fn test_translation(
    state: web::Data<AppState>,
    req: web::Json<TestTranslationRequest>,
) -> ActixResult<HttpResponse, AppError> {
    if req.text.is_empty() {
        return Err(AppError::ValidationError("Text to translate cannot be empty".to_string()));
    }

    let start_time = std::time::Instant::now();
    let translator = state.get_translator();

    tracing::info!("Debug: testing translation of {} chars", req.text.len());

    let outcome = translator.translate(&req.text).await;
    let duration = start_time.elapsed();

    if outcome.degraded {
        tracing::warn!("Debug: translation test fell back after {:.2}s", duration.as_secs_f64());
    } else {
        tracing::info!("Debug: translation test succeeded in {:.2}s", duration.as_secs_f64());
    }

    Ok(HttpResponse::Ok().json(TestTranslationResponse {
        success: !outcome.degraded,
        original: req.text.clone(),
        translated: outcome.text,
        degraded: outcome.degraded,
        duration_ms: duration.as_millis() as u64,
    }))
}

/// List the live classroom sessions and their student counts
///
/// GET /debug/rooms
pub async fn list_rooms(state: web::Data<AppState>) -> ActixResult<HttpResponse, AppError> {
    let rooms = state.registry.summary();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "room_count": rooms.len(),
        "rooms": rooms,
    })))
}

/// Get debug info about the environment and configuration
///
/// GET /debug/environment
pub async fn debug_environment(state: web::Data<AppState>) -> ActixResult<HttpResponse, AppError> {
    let config = state.get_config();

    let env_info = serde_json::json!({
        "host_env": std::env::var("HOST").unwrap_or_else(|_| "not set".to_string()),
        "port_env": std::env::var("PORT").unwrap_or_else(|_| "not set".to_string()),
        "rust_log": std::env::var("RUST_LOG").unwrap_or_else(|_| "not set".to_string()),
        "http_proxy": std::env::var("HTTP_PROXY").unwrap_or_else(|_| "not set".to_string()),
        "https_proxy": std::env::var("HTTPS_PROXY").unwrap_or_else(|_| "not set".to_string()),
        "translation_endpoint": config.translation.endpoint,
        "language_pair": format!("{} -> {}", config.translation.source_lang, config.translation.target_lang),
    });

    Ok(HttpResponse::Ok().json(env_info))
}

/// Configuration for debug routes
pub fn configure_debug_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/debug")
            .route("/test-translation", web::post().to(test_translation))
            .route("/rooms", web::get().to(list_rooms))
            .route("/environment", web::get().to(debug_environment))
    );
}
