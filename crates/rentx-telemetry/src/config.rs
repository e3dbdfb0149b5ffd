//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or a directive list).
    pub log_level: String,

    /// Whether to write logs to stdout at all.
    pub console_output: bool,

    /// Whether to emit JSON instead of human readable lines.
    pub json_logs: bool,

    /// RenVM network label (mainnet, testnet, devnet).
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "rentx".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RENTX_SERVICE_NAME`: Service name (default: rentx)
    /// - `RENTX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `RENTX_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `RENTX_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `RENTX_NETWORK`: Network name (default: testnet)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("RENTX_SERVICE_NAME").unwrap_or_else(|_| "rentx".to_string()),

            log_level: env::var("RENTX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("RENTX_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("RENTX_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            network: env::var("RENTX_NETWORK").unwrap_or_else(|_| "testnet".to_string()),
        }
    }

    /// Configuration for tests: debug level, human readable.
    pub fn for_tests() -> Self {
        Self {
            service_name: "rentx-test".to_string(),
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }
}
