//! # Translation Client
//!
//! Wraps the single call this service makes to the external text-translation
//! endpoint. Pure request/response: one HTTP GET per transcript, no state
//! beyond the configured endpoint and language pair.
//!
//! ## Fallback contract:
//! `translate` is total. Whatever goes wrong (connect failure, timeout,
//! non-2xx status, a response body that isn't the expected shape), the
//! original text comes back unchanged and the failure is only logged and
//! counted. No error from this module ever reaches a classroom client.
//!
//! ## Response shape:
//! The service answers with a nested list whose first element's first
//! element's first element is the translated string. Anything else counts
//! as malformed and triggers the fallback.

use crate::config::TranslationConfig;
use anyhow::{Context as _, Result};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one translation attempt. The text is always usable; `degraded`
/// records whether it is the untranslated original (fallback path), which
/// only the metrics care about.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub text: String,
    pub degraded: bool,
}

/// Internal failure modes of one translation request. Never escapes this
/// module; `translate` converts every one of these into the fallback.
#[derive(Debug)]
enum TranslationError {
    /// Transport-level failure: connect error, timeout, non-2xx status
    Request(reqwest::Error),
    /// The service answered 2xx but not with the expected nested-list shape
    MalformedResponse,
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::Request(err) => write!(f, "translation request failed: {}", err),
            TranslationError::MalformedResponse => {
                write!(f, "translation response did not match the expected shape")
            }
        }
    }
}

/// Client for the external translation service.
///
/// ## Construction:
/// Built once at startup and shared through `AppState`; `reqwest::Client`
/// holds a connection pool internally and is designed to be cloned cheaply.
/// The request timeout is enforced here, on the client, so no individual
/// call can hang a transcript forever.
#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    endpoint: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build translation HTTP client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
        })
    }

    /// Translate one transcript from the configured source language to the
    /// configured target language.
    ///
    /// Total: on any failure the outcome carries the original text with the
    /// degraded flag set. See the module docs for the contract.
    pub async fn translate(&self, text: &str) -> TranslationOutcome {
        match self.request_translation(text).await {
            Ok(translated) => {
                debug!(chars = text.len(), "Transcript translated");
                TranslationOutcome { text: translated, degraded: false }
            }
            Err(err) => {
                warn!(error = %err, "Translation unavailable, relaying original text");
                TranslationOutcome { text: text.to_string(), degraded: true }
            }
        }
    }

    async fn request_translation(&self, text: &str) -> Result<String, TranslationError> {
        let body: serde_json::Value = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source_lang.as_str()),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(TranslationError::Request)?
            .error_for_status()
            .map_err(TranslationError::Request)?
            .json()
            .await
            .map_err(TranslationError::Request)?;

        extract_translation(&body).ok_or(TranslationError::MalformedResponse)
    }
}

/// Pull the translated string out of the service's nested-list response.
fn extract_translation(body: &serde_json::Value) -> Option<String> {
    body.get(0)?
        .get(0)?
        .get(0)?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The happy-path response shape decodes to the translated string.
    #[test]
    fn test_extract_translation_expected_shape() {
        let body = json!([[["Good morning", "Günaydın", null, null, 10]], null, "tr"]);
        assert_eq!(extract_translation(&body), Some("Good morning".to_string()));
    }

    /// Every deviation from the expected shape is detected as malformed.
    #[test]
    fn test_extract_translation_rejects_other_shapes() {
        assert_eq!(extract_translation(&json!(null)), None);
        assert_eq!(extract_translation(&json!("Good morning")), None);
        assert_eq!(extract_translation(&json!([])), None);
        assert_eq!(extract_translation(&json!([[]])), None);
        assert_eq!(extract_translation(&json!([[[]]])), None);
        // First leaf present but not a string
        assert_eq!(extract_translation(&json!([[[42]]])), None);
        assert_eq!(extract_translation(&json!({"translated": "x"})), None);
    }

    /// A network failure falls back to the original text, degraded.
    #[actix_web::test]
    async fn test_translate_falls_back_on_network_error() {
        let config = TranslationConfig {
            // Nothing listens here; the connect fails immediately
            endpoint: "http://127.0.0.1:1/translate".to_string(),
            source_lang: "tr".to_string(),
            target_lang: "en".to_string(),
            timeout_ms: 1000,
        };
        let client = TranslationClient::new(&config).unwrap();

        let outcome = client.translate("Merhaba").await;
        assert_eq!(outcome.text, "Merhaba");
        assert!(outcome.degraded);
    }
}
