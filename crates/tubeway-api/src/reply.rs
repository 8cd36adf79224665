//! Success envelopes and small request helpers shared by the handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use tubeway_db::PageRequest;
use tubeway_types::api::{ApiResponse, PageQuery};

use crate::error::ApiError;

pub fn ok<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::OK, data, message)
}

pub fn created<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::CREATED, data, message)
}

/// `{}` as the payload, used for deletions and toggle-offs.
pub fn empty() -> Value {
    json!({})
}

fn with_status<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (status, Json(ApiResponse::new(status.as_u16(), data, message))).into_response()
}

/// Path IDs that do not parse are reported the same way as unknown IDs.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.trim().parse().map_err(|_| ApiError::missing(what))
}

pub fn page_of(query: &PageQuery) -> PageRequest {
    PageRequest::parse(query.page.as_deref(), query.limit.as_deref())
}

/// A required text field: present and not blank once trimmed.
pub fn required(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
