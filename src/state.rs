//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! and WebSocket connection actors simultaneously.
//!
//! ## Key Rust Concepts (IMPORTANT for beginners):
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Every live connection and every HTTP request needs access to the same state
//! - **Memory safety**: Automatically cleans up data when the last reference is dropped
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Why needed**: actix runs several worker threads, so there is no
//!   cooperative single-thread assumption to lean on here; every mutation of
//!   shared relay state must be mutually excluded
//! - **Discipline**: No lock in this codebase is ever held across an await point.
//!   The one suspending operation (the translation call) happens lock-free and
//!   re-reads the registry when it completes.
//!
//! ### Ownership of the registry
//! The session registry is a field of `AppState`, constructed in main() and
//! handed to the server. It is deliberately not a process-wide global: its
//! lifecycle is visibly tied to server start and stop, and tests can build
//! as many independent registries as they like.

use crate::config::AppConfig;
use crate::session::SessionRegistry;
use crate::translation::TranslationClient;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all handlers and connections.
///
/// ## Thread Safety Pattern:
/// All mutable data sits behind Arc<RwLock<T>>:
/// - Multiple requests can read the same data simultaneously
/// - Only one request can modify data at a time
/// - No data races or memory corruption possible
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Relay metrics (updated by middleware, connections, and transcripts)
    pub metrics: Arc<RwLock<RelayMetrics>>,

    /// The session registry: the single source of truth for classroom
    /// membership. Owned here, never a bare global.
    pub registry: SessionRegistry,

    /// Client for the external translation service. Behind a lock so a
    /// runtime config update can swap in a client with new settings.
    translator: Arc<RwLock<TranslationClient>>,

    /// When the server started (never changes, so no lock needed)
    pub start_time: Instant,
}

/// Relay metrics collected across HTTP requests and WebSocket traffic.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: HTTP surface health
/// - **active_connections**: live WebSocket count (capacity planning)
/// - **sessions_created / sessions_displaced**: classroom churn, and how
///   often a code collision silently replaced a live session
/// - **transcripts_relayed / degraded_translations**: core relay throughput
///   and how often the translation fallback fired
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of HTTP errors encountered since server start
    pub error_count: u64,

    /// Current number of live WebSocket connections
    pub active_connections: u32,

    /// Total sessions created since server start
    pub sessions_created: u64,

    /// How many of those creations displaced a live session under the same code
    pub sessions_displaced: u64,

    /// Total transcripts translated and broadcast
    pub transcripts_relayed: u64,

    /// Transcripts relayed with the untranslated original (fallback path)
    pub degraded_translations: u64,

    /// Detailed metrics for each API endpoint (URL path)
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    ///
    /// Builds the translation client up front so a misconfigured endpoint
    /// fails the server start instead of the first classroom transcript.
    pub fn new(config: AppConfig) -> Result<Self> {
        let translator = TranslationClient::new(&config.translation)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(RelayMetrics::default())),
            registry: SessionRegistry::new(),
            translator: Arc::new(RwLock::new(translator)),
            start_time: Instant::now(),
        })
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    /// AppConfig is designed to be cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Get a handle on the current translation client.
    ///
    /// The client is cheap to clone (it shares its connection pool), so
    /// callers take a clone and never hold the lock across their request.
    pub fn get_translator(&self) -> TranslationClient {
        self.translator.read().unwrap().clone()
    }

    /// Update the configuration with validation.
    ///
    /// Also rebuilds the translation client so endpoint, language, and
    /// timeout changes take effect for the next transcript, not the next
    /// process restart.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        if let Err(e) = new_config.validate() {
            return Err(e.to_string());
        }

        let translator = TranslationClient::new(&new_config.translation).map_err(|e| e.to_string())?;

        *self.config.write().unwrap() = new_config;
        *self.translator.write().unwrap() = translator;
        Ok(())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## HashMap operations:
    /// The first time we see an endpoint, we create a new EndpointMetric with
    /// default values. Subsequent requests update the existing entry.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A WebSocket connection was accepted.
    pub fn connection_opened(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_connections += 1;
    }

    /// A WebSocket connection closed.
    ///
    /// ## Safety check:
    /// Includes a check to prevent underflow (going below zero), so a stray
    /// double-close cannot panic the metrics path.
    pub fn connection_closed(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_connections > 0 {
            metrics.active_connections -= 1;
        }
    }

    /// A session was created; `displaced` records whether it replaced a live
    /// session under the same code.
    pub fn session_created(&self, displaced: bool) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.sessions_created += 1;
        if displaced {
            metrics.sessions_displaced += 1;
        }
    }

    /// A transcript was translated and broadcast; `degraded` records whether
    /// the translation fallback fired.
    pub fn transcript_relayed(&self, degraded: bool) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.transcripts_relayed += 1;
        if degraded {
            metrics.degraded_translations += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// Takes a read lock for consistent data, then clones so we don't hold
    /// the lock while serializing the HTTP response.
    pub fn get_metrics_snapshot(&self) -> RelayMetrics {
        let metrics = self.metrics.read().unwrap();
        RelayMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_connections: metrics.active_connections,
            sessions_created: metrics.sessions_created,
            sessions_displaced: metrics.sessions_displaced,
            transcripts_relayed: metrics.transcripts_relayed,
            degraded_translations: metrics.degraded_translations,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Implementation of utility methods for EndpointMetric.
impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    ///
    /// ## Formula:
    /// Average = Total Duration ÷ Number of Requests
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no average to calculate
        }
    }

    /// Calculate the error rate for this endpoint as a fraction (0.0 to 1.0).
    ///
    /// ## Return values:
    /// - 0.0 = No errors
    /// - 0.5 = Half the requests failed
    /// - 1.0 = All requests failed
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no errors possible
        }
    }
}
