//! Per-call and per-service configuration.
//!
//! # Design
//! `TransferConfig` collapses every optional knob of a call into one value
//! with independently defaulted fields. Unset fields fall back to the
//! service's defaults when the call is dispatched.
//!
//! `ServiceConfig` describes the service itself and can be loaded from the
//! environment. The service-wide validation flag starts from
//! `ServiceConfig::auto_validate` and can be flipped at runtime.

use std::time::Duration;

use serde::Deserialize;

use crate::progress::ProgressObserver;

/// Environment variable names read by [`ServiceConfig::from_env`].
pub const ENV_AUTO_VALIDATE: &str = "COURIER_AUTO_VALIDATE";
pub const ENV_TIMEOUT_SECS: &str = "COURIER_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "COURIER_USER_AGENT";

/// Options for a single call.
#[derive(Debug, Clone, Default)]
pub struct TransferConfig {
    /// Send the endpoint body as a separate upload payload.
    pub use_upload_mode: Option<bool>,
    /// Per-call validation switch. `Some(false)` disables validation for
    /// this call regardless of the service-wide flag.
    pub auto_validate: Option<bool>,
    /// Observer bound to this call's transfer.
    pub progress: Option<ProgressObserver>,
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(mut self) -> Self {
        self.use_upload_mode = Some(true);
        self
    }

    pub fn auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = Some(enabled);
        self
    }

    pub fn progress(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    pub(crate) fn resolve(&self, defaults: &TransferDefaults) -> TransferDefaults {
        TransferDefaults {
            use_upload_mode: self.use_upload_mode.unwrap_or(defaults.use_upload_mode),
            auto_validate: self.auto_validate.unwrap_or(defaults.auto_validate),
        }
    }
}

/// Fully resolved call options. The service keeps one instance as the
/// fallback for unset `TransferConfig` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDefaults {
    pub use_upload_mode: bool,
    pub auto_validate: bool,
}

impl Default for TransferDefaults {
    fn default() -> Self {
        Self {
            use_upload_mode: false,
            auto_validate: true,
        }
    }
}

/// Errors from loading a [`ServiceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected a boolean, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}: expected a number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("invalid service config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Service-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Initial value of the service-wide validation flag.
    pub auto_validate: bool,
    /// Whole-request timeout applied by the transport, in seconds.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_validate: true,
            timeout_secs: None,
            user_agent: concat!("courier/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Defaults overridden by `COURIER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_AUTO_VALIDATE) {
            config.auto_validate = parse_bool(&value).ok_or(ConfigError::InvalidBool {
                var: ENV_AUTO_VALIDATE,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout {
                    var: ENV_TIMEOUT_SECS,
                    value,
                })?;
            config.timeout_secs = Some(secs);
        }
        if let Some(value) = lookup(ENV_USER_AGENT) {
            config.user_agent = value;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
