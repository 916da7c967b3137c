use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();
    let active_sessions = state.registry.active_session_count();

    let system_status = get_system_status(&metrics, active_sessions);

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "classroom-relay-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_connections": metrics.active_connections,
            "active_sessions": active_sessions
        },
        "relay": {
            "transcripts_relayed": metrics.transcripts_relayed,
            "degraded_translations": metrics.degraded_translations,
            "sessions_created": metrics.sessions_created,
            "sessions_displaced": metrics.sessions_displaced
        },
        "translation": {
            "endpoint": config.translation.endpoint,
            "source_lang": config.translation.source_lang,
            "target_lang": config.translation.target_lang,
            "timeout_ms": config.translation.timeout_ms
        },
        "system": system_status
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "relay": {
            "active_connections": metrics.active_connections,
            "active_sessions": state.registry.active_session_count(),
            "sessions_created": metrics.sessions_created,
            "sessions_displaced": metrics.sessions_displaced,
            "transcripts_relayed": metrics.transcripts_relayed,
            "degraded_translations": metrics.degraded_translations,
            "degraded_rate": if metrics.transcripts_relayed > 0 {
                metrics.degraded_translations as f64 / metrics.transcripts_relayed as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats
    }))
}

fn get_system_status(metrics: &crate::state::RelayMetrics, active_sessions: usize) -> serde_json::Value {
    let degraded_rate = if metrics.transcripts_relayed > 0 {
        metrics.degraded_translations as f64 / metrics.transcripts_relayed as f64
    } else {
        0.0
    };

    // Translation trouble is the thing an operator needs to see first:
    // classrooms keep running on fallback text without anyone complaining
    let status = if degraded_rate > 0.5 {
        "translation_degraded"
    } else if degraded_rate > 0.1 {
        "translation_unstable"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "degraded_translation_percent": (degraded_rate * 100.0).round(),
        "active_sessions": active_sessions,
        "active_connections": metrics.active_connections,
        "warnings": if degraded_rate > 0.1 && metrics.transcripts_relayed > 0 {
            vec!["Translation fallback firing - check the translation endpoint"]
        } else {
            vec![]
        }
    })
}
