use axum::response::Response;

use crate::reply::{empty, ok};

/// GET /healthcheck
pub async fn healthcheck() -> Response {
    ok(empty(), "All OK")
}
