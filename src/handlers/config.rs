use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "translation": {
                "endpoint": config.translation.endpoint,
                "source_lang": config.translation.source_lang,
                "target_lang": config.translation.target_lang,
                "timeout_ms": config.translation.timeout_ms
            },
            "performance": {
                "heartbeat_interval_secs": config.performance.heartbeat_interval_secs,
                "client_timeout_secs": config.performance.client_timeout_secs
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str)?;

    state.update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "translation": {
                "endpoint": current_config.translation.endpoint,
                "source_lang": current_config.translation.source_lang,
                "target_lang": current_config.translation.target_lang,
                "timeout_ms": current_config.translation.timeout_ms
            },
            "performance": {
                "heartbeat_interval_secs": current_config.performance.heartbeat_interval_secs,
                "client_timeout_secs": current_config.performance.client_timeout_secs
            }
        }
    })))
}
