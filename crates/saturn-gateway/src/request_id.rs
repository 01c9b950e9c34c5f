//! Request correlation middleware.
//!
//! Every request gets an id, taken from a valid `X-Request-Id` header or freshly
//! generated. The id is echoed in the response header, attached to the request's
//! tracing span, and written into error bodies. Latency is recorded on the
//! shared metrics handle.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::Instrument;

use saturn_auth::JwtValidator;
use saturn_control::ControlPlane;

use crate::envelope::ResponseMeta;
use crate::error::{ErrorBody, ErrorResponse};
use crate::state::GatewayState;

/// Header carrying the request id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Use the presented header value if it is a sane id, otherwise generate one.
    fn from_header(value: Option<&HeaderValue>) -> Self {
        value
            .and_then(|v| v.to_str().ok())
            .filter(|id| is_valid_request_id(id))
            .map_or_else(Self::generate, Self::new)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(Self::generate))
    }
}

/// Assign the request id, run the request in its span and record latency.
pub async fn track_request<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let started = Instant::now();
    let request_id = RequestId::from_header(request.headers().get(&REQUEST_ID_HEADER));
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        tenant_id = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span).await;
    let mut response = attach_request_id(response, &request_id);

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.control.metrics().record_request(elapsed);

    response
}

/// Rebuild error bodies so that their `meta` carries the request id.
fn attach_request_id(response: Response, request_id: &RequestId) -> Response {
    let Some(error) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };

    let (parts, _) = response.into_parts();
    let body = ErrorResponse {
        error,
        meta: ResponseMeta {
            request_id: Some(request_id.to_string()),
        },
    };
    (parts, Json(body)).into_response()
}
