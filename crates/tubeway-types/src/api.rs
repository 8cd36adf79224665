use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Short-lived access token claims. Carries enough of the profile that the
/// auth middleware can identify the caller without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub exp: usize,
}

/// Long-lived refresh token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub exp: usize,
    /// Random nonce so that two tokens issued in the same second differ.
    pub jti: Uuid,
}

// -- Envelope --

/// Every response body, success or failure, uses this shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            data,
            message: message.into(),
            success: status_code < 400,
        }
    }
}

/// Body of a failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub data: Option<()>,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: serde_json::Value,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// -- Content --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

// -- Query strings --

/// Raw paging parameters. Kept as strings so that garbage input falls back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
}

// -- Dashboard --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos_count: u64,
    pub total_video_likes_count: u64,
    pub total_subscribers_count: u64,
    pub total_views: u64,
}
