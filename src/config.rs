//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **struct**: Custom data types that group related fields together
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: Automatically implements common traits:
///   - `Debug`: Allows printing with {:?} for debugging
///   - `Clone`: Allows making copies of the struct
///   - `Serialize`: Can convert this struct to JSON, TOML, etc.
///   - `Deserialize`: Can create this struct from JSON, TOML, etc.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, translation, performance)
/// makes it easier to understand and maintain as the application grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub translation: TranslationConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on (1-65535)
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
/// - `port = 3000`: The default relay port; deployment platforms override it via PORT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,  // u16 = unsigned 16-bit integer (0-65535), perfect for port numbers
}

/// Translation service configuration.
///
/// ## Fields:
/// - `endpoint`: Base URL of the external translation service
/// - `source_lang`: Language the teacher speaks in the classroom (ISO 639-1 code)
/// - `target_lang`: Language shown to students (ISO 639-1 code)
/// - `timeout_ms`: Hard deadline for one translation request
///
/// ## Deployment note:
/// Source and target languages are fixed per deployment. A classroom running
/// in Turkish with English subtitles uses the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub source_lang: String,
    pub target_lang: String,
    pub timeout_ms: u64,
}

/// Performance and connection supervision tuning.
///
/// ## Fields:
/// - `heartbeat_interval_secs`: How often the server pings each WebSocket client
/// - `client_timeout_secs`: How long a client may stay silent before its connection is dropped
///
/// ## Tuning guidelines:
/// - Shorter intervals detect dead classroom clients faster but add chatter
/// - The timeout must be comfortably larger than the interval, or healthy
///   clients get disconnected between pings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

/// Provides default configuration values.
///
/// ## Rust Concepts:
/// - **impl Default**: Implements the Default trait, which provides a `default()` method
/// - **Self**: Refers to the current type (AppConfig)
/// - **to_string()**: Converts string literals (&str) to owned String objects
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 3000,                     // Matches what the classroom client expects
            },
            translation: TranslationConfig {
                endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
                source_lang: "tr".to_string(),  // Spoken classroom language
                target_lang: "en".to_string(),  // Display language for students
                timeout_ms: 5000,               // A transcript older than 5s is stale anyway
            },
            performance: PerformanceConfig {
                heartbeat_interval_secs: 30,
                client_timeout_secs: 60,
            },
        }
    }
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Rust Concepts:
    /// - **Builder pattern**: Chain method calls to configure the config loader
    /// - **?**: Early return on error (if any step fails, return the error)
    /// - **env::var()**: Read environment variables, returns Result<String, VarError>
    /// - **if let Ok(...)**: Only execute if the environment variable exists
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_SERVER_PORT=8080`: Override server port
    /// - `APP_TRANSLATION_TARGET_LANG=de`: Override the display language
    /// - `HOST=0.0.0.0`: Special case for deployment platforms
    /// - `PORT=8080`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Handle special environment variables used by deployment platforms
        // These don't follow the APP_ prefix convention but are commonly used
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Translation endpoint and language codes are not empty
    /// - Translation timeout is not 0 (that would fail every request)
    /// - Heartbeat interval is shorter than the client timeout
    ///
    /// ## Why validate:
    /// Catching configuration errors early prevents runtime failures and
    /// provides clear error messages about what's wrong.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.translation.endpoint.is_empty() {
            return Err(anyhow::anyhow!("Translation endpoint cannot be empty"));
        }

        if self.translation.source_lang.is_empty() || self.translation.target_lang.is_empty() {
            return Err(anyhow::anyhow!("Translation language codes cannot be empty"));
        }

        if self.translation.timeout_ms == 0 {
            return Err(anyhow::anyhow!("Translation timeout must be greater than 0"));
        }

        if self.performance.heartbeat_interval_secs == 0 {
            return Err(anyhow::anyhow!("Heartbeat interval must be greater than 0"));
        }

        if self.performance.client_timeout_secs <= self.performance.heartbeat_interval_secs {
            return Err(anyhow::anyhow!(
                "Client timeout ({}s) must be longer than the heartbeat interval ({}s)",
                self.performance.client_timeout_secs,
                self.performance.heartbeat_interval_secs
            ));
        }

        Ok(())  // All validation passed
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## What this does:
    /// 1. Parse the JSON string into a generic value
    /// 2. Extract individual configuration fields if they exist
    /// 3. Update only the fields that were provided
    /// 4. Validate the updated configuration
    ///
    /// ## Rust Concepts:
    /// - **&mut self**: Mutable reference (allows modifying the struct)
    /// - **serde_json::Value**: Generic JSON value that can hold any JSON data
    /// - **if let Some(...)**: Only execute if the field exists in the JSON
    /// - **and_then()**: Chain operations that might fail
    /// - **as_str(), as_u64()**: Convert JSON values to specific types
    ///
    /// ## Partial updates:
    /// This method allows updating only some fields, not the entire configuration.
    /// For example, you can send just `{"translation": {"target_lang": "de"}}` to
    /// switch the display language without touching anything else.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        // Parse the JSON string into a generic value
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        // Update server configuration if provided
        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;  // Convert u64 to u16 for port number
            }
        }

        // Update translation configuration if provided
        if let Some(translation) = partial_config.get("translation") {
            if let Some(endpoint) = translation.get("endpoint").and_then(|v| v.as_str()) {
                self.translation.endpoint = endpoint.to_string();
            }
            if let Some(source) = translation.get("source_lang").and_then(|v| v.as_str()) {
                self.translation.source_lang = source.to_string();
            }
            if let Some(target) = translation.get("target_lang").and_then(|v| v.as_str()) {
                self.translation.target_lang = target.to_string();
            }
            if let Some(timeout) = translation.get("timeout_ms").and_then(|v| v.as_u64()) {
                self.translation.timeout_ms = timeout;
            }
        }

        // Update performance configuration if provided
        if let Some(performance) = partial_config.get("performance") {
            if let Some(interval) = performance.get("heartbeat_interval_secs").and_then(|v| v.as_u64()) {
                self.performance.heartbeat_interval_secs = interval;
            }
            if let Some(timeout) = performance.get("client_timeout_secs").and_then(|v| v.as_u64()) {
                self.performance.client_timeout_secs = timeout;
            }
        }

        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }
}

/// Tests for the configuration module.
///
/// ## Rust Concepts:
/// - **#[cfg(test)]**: Only compile this code when running tests
/// - **mod tests**: A module containing test functions
/// - **#[test]**: Marks a function as a test case
/// - **assert_eq!**: Checks that two values are equal
/// - **assert!**: Checks that a condition is true
/// - **is_ok(), is_err()**: Check if a Result is success or error
#[cfg(test)]
mod tests {
    use super::*;  // Import everything from the parent module

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.translation.source_lang, "tr");
        assert_eq!(config.translation.target_lang, "en");
        // Ensure the default config passes validation
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;  // Invalid port
        // Validation should fail for port 0
        assert!(config.validate().is_err());
    }

    /// Test that the heartbeat interval must stay below the client timeout.
    #[test]
    fn test_heartbeat_must_be_shorter_than_timeout() {
        let mut config = AppConfig::default();
        config.performance.heartbeat_interval_secs = 60;
        config.performance.client_timeout_secs = 60;
        assert!(config.validate().is_err());
    }

    /// Test that runtime configuration updates work correctly.
    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"translation": {"target_lang": "de"}}"#;  // Update only the display language
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.translation.target_lang, "de");  // Language should be updated
        // Other fields should remain unchanged
        assert_eq!(config.translation.source_lang, "tr");
        assert_eq!(config.server.port, 3000);
    }

    /// Test that an update which breaks validation is rejected.
    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"translation": {"timeout_ms": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
