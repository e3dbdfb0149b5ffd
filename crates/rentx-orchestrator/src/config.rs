//! Orchestrator configuration from environment variables.

use crate::domain::ConfigError;
use crate::machines::burn::BurnPolicy;
use crate::machines::gateway::GatewayPolicy;
use std::env;
use std::time::Duration;

/// Default confirmation polling interval.
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Settings shared by gateway and burn orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How often confirmation monitors poll the source chain.
    pub confirmation_poll_interval: Duration,

    /// Claim with empty contract params as soon as a deposit is claimable.
    pub auto_claim: bool,

    /// Acknowledge once the destination chain confirms a claim.
    pub auto_acknowledge: bool,

    /// Submit the burn as soon as it has been created.
    pub auto_submit: bool,

    /// Add protocol fees to suggested amounts.
    pub auto_fees: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confirmation_poll_interval: DEFAULT_CONFIRMATION_POLL_INTERVAL,
            auto_claim: false,
            auto_acknowledge: false,
            auto_submit: false,
            auto_fees: false,
        }
    }
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RENTX_CONFIRMATION_POLL_MS`: Poll interval in milliseconds (default: 15000)
    /// - `RENTX_AUTO_CLAIM`: Claim claimable deposits automatically (default: false)
    /// - `RENTX_AUTO_ACKNOWLEDGE`: Acknowledge confirmed claims (default: false)
    /// - `RENTX_AUTO_SUBMIT`: Submit burns once created (default: false)
    /// - `RENTX_AUTO_FEES`: Include fees in suggested amounts (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            confirmation_poll_interval: match env::var("RENTX_CONFIRMATION_POLL_MS") {
                Ok(raw) => Duration::from_millis(parse_millis("RENTX_CONFIRMATION_POLL_MS", &raw)?),
                Err(_) => defaults.confirmation_poll_interval,
            },
            auto_claim: env_flag("RENTX_AUTO_CLAIM", defaults.auto_claim)?,
            auto_acknowledge: env_flag("RENTX_AUTO_ACKNOWLEDGE", defaults.auto_acknowledge)?,
            auto_submit: env_flag("RENTX_AUTO_SUBMIT", defaults.auto_submit)?,
            auto_fees: env_flag("RENTX_AUTO_FEES", defaults.auto_fees)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.confirmation_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_auto_claim(mut self, auto_claim: bool) -> Self {
        self.auto_claim = auto_claim;
        self
    }

    #[must_use]
    pub fn with_auto_acknowledge(mut self, auto_acknowledge: bool) -> Self {
        self.auto_acknowledge = auto_acknowledge;
        self
    }

    #[must_use]
    pub fn with_auto_submit(mut self, auto_submit: bool) -> Self {
        self.auto_submit = auto_submit;
        self
    }

    #[must_use]
    pub fn with_auto_fees(mut self, auto_fees: bool) -> Self {
        self.auto_fees = auto_fees;
        self
    }

    pub(crate) fn gateway_policy(&self) -> GatewayPolicy {
        GatewayPolicy {
            auto_claim: self.auto_claim,
            auto_acknowledge: self.auto_acknowledge,
        }
    }

    pub(crate) fn burn_policy(&self) -> BurnPolicy {
        BurnPolicy {
            auto_submit: self.auto_submit,
        }
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_flag(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
