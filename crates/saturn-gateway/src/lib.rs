//! HTTP gateway for the saturn agent platform.
//!
//! This crate provides the public-facing API. It handles:
//!
//! - Bearer authentication with signed tokens or `sk_` API keys
//! - Role and scope permission checks per route
//! - Request correlation ids and the JSON response envelope
//! - Mapping control plane failures to stable error codes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! │                       (HTTP / JSON)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       saturn-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ Request id  │ │   Auth      │ │  Router             │    │
//! │  │ + metrics   │ │  Extractor  │ │  + Handlers         │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     ┌────────┴────────┐
//!                     ▼                 ▼
//!              ┌──────────────┐  ┌──────────────┐
//!              │ Control      │  │ Auth         │
//!              │ Plane        │  │ (JWT / keys) │
//!              └──────────────┘  └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use saturn_auth::{AuthConfig, HmacJwtValidator};
//! use saturn_control::ControlPlaneService;
//! use saturn_gateway::{create_router, GatewayConfig, GatewayState};
//! use saturn_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/saturn")?);
//! let control = Arc::new(ControlPlaneService::with_defaults(store));
//! let jwt_validator = Arc::new(HmacJwtValidator::new(&AuthConfig::default()));
//!
//! let state = GatewayState::new(control, jwt_validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod request_id;
pub mod routes;
pub mod state;

pub use auth::AuthUser;
pub use config::GatewayConfig;
pub use envelope::ApiResponse;
pub use error::ApiError;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use routes::create_router;
pub use state::GatewayState;
