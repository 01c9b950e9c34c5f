//! Saturn Gateway - HTTP API entry point.
//!
//! Configuration comes from the environment:
//!
//! - `LISTEN_ADDR` (default `0.0.0.0:8080`)
//! - `DATA_DIR` (default `/data/saturn`)
//! - `SATURN_JWT_SECRET`, `SATURN_JWT_ALG` (`HS256`, `HS384` or `HS512`)
//! - `SATURN_BILLING_CURRENCY` (default `USD`)
//! - `SATURN_ROLE_PERMISSIONS_JSON`, a `{"role": ["perm", ...]}` table
//! - `SATURN_API_KEYS_JSON`, a list of `{"key_hash", "tenant_id", "scopes", "active"}`
//!   entries accepted in addition to stored keys
//! - `SATURN_MODEL_URL`, `SATURN_MODEL_API_KEY`: an OpenAI-compatible endpoint.
//!   Without a URL the built-in echo model answers.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock JWT validator accepting
//! tokens of the form `test-token:<tenant>:<role>`.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use saturn_auth::MockJwtValidator;
use saturn_auth::{RolePermissions, StaticApiKey};
#[cfg(not(feature = "dev-mode"))]
use saturn_auth::{AuthConfig, HmacJwtValidator};
use saturn_control::{
    ControlPlaneService, EchoModelClient, HttpModelClient, Metrics, ModelClient,
};
use saturn_gateway::{create_router, GatewayConfig, GatewayState};
use saturn_store::RocksStore;

/// Timeout applied to model provider calls.
const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,saturn=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Saturn Gateway");

    // Load configuration from environment
    let mut config = GatewayConfig::default();
    if let Ok(addr) = std::env::var("LISTEN_ADDR") {
        config.listen_addr = addr;
    }
    if let Ok(currency) = std::env::var("SATURN_BILLING_CURRENCY") {
        config.billing_currency = currency;
    }
    if let Ok(json) = std::env::var("SATURN_ROLE_PERMISSIONS_JSON") {
        config.role_permissions = RolePermissions::from_json(&json)?;
    }
    if let Ok(json) = std::env::var("SATURN_API_KEYS_JSON") {
        config.api_keys = StaticApiKey::list_from_json(&json)?;
    }
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/saturn".into());
    let model_url = std::env::var("SATURN_MODEL_URL").ok();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %data_dir,
        billing_currency = %config.billing_currency,
        static_api_keys = config.api_keys.len(),
        model_url = ?model_url,
        "Gateway configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir)?);

    let model: Arc<dyn ModelClient> = if let Some(url) = model_url {
        let api_key = std::env::var("SATURN_MODEL_API_KEY").ok();
        tracing::info!(model_url = %url, "Using HTTP model provider");
        Arc::new(HttpModelClient::new(url, api_key, MODEL_TIMEOUT))
    } else {
        tracing::warn!("No SATURN_MODEL_URL set - replies come from the echo model");
        Arc::new(EchoModelClient)
    };

    let control = Arc::new(ControlPlaneService::new(
        store,
        model,
        Arc::new(Metrics::new()),
        config.control_config(),
    ));
    tracing::info!("Control plane initialized");

    // Initialize JWT validator
    #[cfg(feature = "dev-mode")]
    let jwt_validator = {
        tracing::warn!("DEV MODE ENABLED - using mock JWT validator");
        tracing::warn!("Use tokens in format: test-token:<tenant>:<role>");
        Arc::new(MockJwtValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let jwt_validator = {
        let mut auth_config = AuthConfig::default();
        match std::env::var("SATURN_JWT_SECRET") {
            Ok(secret) => auth_config.jwt_secret = secret,
            Err(_) => tracing::warn!("No SATURN_JWT_SECRET set - using the default secret"),
        }
        if let Ok(alg) = std::env::var("SATURN_JWT_ALG") {
            auth_config.algorithm = AuthConfig::parse_algorithm(&alg)?;
        }
        Arc::new(HmacJwtValidator::new(&auth_config))
    };
    tracing::info!("JWT validator initialized");

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(control, jwt_validator, config);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
