//! Success response envelope and request extractors.
//!
//! Successful responses are rendered as `{"data": ..., "meta": {"request_id"}}`.
//! The `ApiJson`, `ApiPath` and `ApiQuery` extractors behave like their axum
//! counterparts but reject with [`ApiError`], so malformed input gets the
//! standard error body.

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::request_id::RequestId;

/// Response metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    /// Correlation id of the request.
    pub request_id: Option<String>,
}

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
    meta: ResponseMeta,
}

/// A successful response.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    request_id: RequestId,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// A `200 OK` response.
    pub fn ok(request_id: RequestId, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            request_id,
            data,
        }
    }

    /// A `201 Created` response.
    pub fn created(request_id: RequestId, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            request_id,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            data: self.data,
            meta: ResponseMeta {
                request_id: Some(self.request_id.into_inner()),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// JSON body extractor rejecting with [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor rejecting with [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor rejecting with [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
