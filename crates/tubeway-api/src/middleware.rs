use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    extract::cookie::CookieJar,
    headers::{Authorization, authorization::Bearer},
};
use uuid::Uuid;

use crate::auth::{ACCESS_COOKIE, verify_access_token};
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// The caller, as resolved from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Validate the access token from the `accessToken` cookie or the
/// `Authorization: Bearer` header. The user must still exist.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| bearer.map(|TypedHeader(auth)| auth.token().to_string()))
        .ok_or_else(|| ApiError::auth("Unauthorized request"))?;

    let claims = verify_access_token(&state.tokens, &token).ok_or_else(|| ApiError::auth("Invalid access token"))?;

    let id = claims.sub;
    let user = blocking(&state, move |db| Ok(db.get_user(&id)?))
        .await?
        .ok_or_else(|| ApiError::auth("Invalid access token"))?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(req).await)
}
