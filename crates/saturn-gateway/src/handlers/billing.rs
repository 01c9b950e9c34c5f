//! Usage and invoice endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use saturn_auth::{perm, JwtValidator};
use saturn_control::ControlPlane;
use saturn_core::InvoiceId;

use crate::auth::AuthUser;
use crate::envelope::{ApiPath, ApiQuery, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// `?period=YYYY-MM` query.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    /// Calendar month.
    #[serde(default)]
    pub period: Option<String>,
}

/// Summarize usage, all-time or for one period.
///
/// # Errors
///
/// Returns `BAD_REQUEST` if the period is malformed.
pub async fn usage_summary<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::BILLING_READ)?;
    let report = state
        .control
        .usage_summary(&user.identity, query.period.as_deref())
        .await?;

    Ok(ApiResponse::ok(request_id, report))
}

/// List the tenant's usage events.
///
/// # Errors
///
/// Returns an error if the caller lacks `billing:read`.
pub async fn usage_events<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::BILLING_READ)?;
    let events = state.control.list_usage_events(&user.identity).await?;

    Ok(ApiResponse::ok(request_id, events))
}

/// Generate a draft invoice for `?period=YYYY-MM`.
///
/// # Errors
///
/// Returns `BAD_REQUEST` if the period is missing or malformed.
pub async fn generate_invoice<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::BILLING_WRITE)?;
    let period = query
        .period
        .ok_or_else(|| ApiError::BadRequest("period is required, expected YYYY-MM".into()))?;
    let invoice = state.control.generate_invoice(&user.identity, &period).await?;

    Ok(ApiResponse::created(request_id, invoice))
}

/// List the tenant's invoices, newest first.
///
/// # Errors
///
/// Returns an error if the caller lacks `billing:read`.
pub async fn list_invoices<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::BILLING_READ)?;
    let invoices = state.control.list_invoices(&user.identity).await?;

    Ok(ApiResponse::ok(request_id, invoices))
}

/// Get an invoice.
///
/// # Errors
///
/// Returns `NOT_FOUND` if the invoice doesn't exist for the caller's tenant.
pub async fn get_invoice<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(invoice_id): ApiPath<InvoiceId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::BILLING_READ)?;
    let invoice = state.control.get_invoice(&user.identity, &invoice_id).await?;

    Ok(ApiResponse::ok(request_id, invoice))
}
