//! HTTP gateway settings.
//!
//! Everything has a default, so a partial JSON document or an empty one is a
//! valid configuration.

use std::time::Duration;

use saturn_auth::{RolePermissions, StaticApiKey};
use saturn_control::ControlConfig;
use serde::Deserialize;

/// Settings for the HTTP server and the control plane it fronts.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Socket address to bind.
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Largest accepted request body, in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Seconds before an in-flight request is abandoned.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Currency of generated invoices.
    #[serde(default = "GatewayConfig::default_currency")]
    pub billing_currency: String,

    /// How many recent messages form the model input.
    #[serde(default = "GatewayConfig::default_history_limit")]
    pub history_limit: usize,

    /// Role to permission table.
    #[serde(default)]
    pub role_permissions: RolePermissions,

    /// API keys provisioned outside the key store.
    #[serde(default)]
    pub api_keys: Vec<StaticApiKey>,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    fn default_currency() -> String {
        "USD".to_string()
    }

    const fn default_history_limit() -> usize {
        20
    }

    /// The request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Control plane settings derived from this configuration.
    #[must_use]
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            history_limit: self.history_limit,
            billing_currency: self.billing_currency.clone(),
            static_api_keys: self.api_keys.clone(),
            ..ControlConfig::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            billing_currency: Self::default_currency(),
            history_limit: Self::default_history_limit(),
            role_permissions: RolePermissions::default(),
            api_keys: Vec::new(),
        }
    }
}
