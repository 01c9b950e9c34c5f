//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod access;
pub mod agents;
pub mod billing;
pub mod health;
pub mod knowledge;
pub mod sessions;
pub mod tools;

use crate::error::ApiError;

/// Fallback for unmatched routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("route".to_string())
}
