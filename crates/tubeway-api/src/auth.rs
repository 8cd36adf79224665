use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use tubeway_db::StoreError;
use tubeway_types::api::{AccessClaims, LoginRequest, LoginResponse, RefreshClaims, RefreshRequest, TokenPair};
use tubeway_types::models::User;

use crate::error::ApiError;
use crate::media::{Form, MediaKind, discard_on_error, store_upload};
use crate::middleware::AuthUser;
use crate::reply::{empty, ok, required};
use crate::state::{AppState, blocking};
use crate::users::public_profile;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Signing secrets and lifetimes for both token kinds.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_secret: String,
    pub refresh_ttl_secs: i64,
}

// -- Passwords --

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Dependency(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("Stored password hash is unreadable");
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

// -- Tokens --

fn expiry(ttl_secs: i64) -> usize {
    (Utc::now() + chrono::Duration::seconds(ttl_secs)).timestamp() as usize
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, ApiError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Dependency(format!("Token signing failed: {}", e)))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .ok()
}

pub fn issue_access_token(config: &TokenConfig, user: &User) -> Result<String, ApiError> {
    let claims = AccessClaims {
        sub: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        exp: expiry(config.access_ttl_secs),
    };
    sign(&claims, &config.access_secret)
}

pub fn issue_refresh_token(config: &TokenConfig, user_id: Uuid) -> Result<String, ApiError> {
    let claims = RefreshClaims {
        sub: user_id,
        exp: expiry(config.refresh_ttl_secs),
        jti: Uuid::new_v4(),
    };
    sign(&claims, &config.refresh_secret)
}

pub fn verify_access_token(config: &TokenConfig, token: &str) -> Option<AccessClaims> {
    verify(token, &config.access_secret)
}

pub fn verify_refresh_token(config: &TokenConfig, token: &str) -> Option<RefreshClaims> {
    verify(token, &config.refresh_secret)
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value)).http_only(true).secure(true).path("/").build()
}

/// An already expired cookie with the same attributes as the session one.
fn cleared_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

fn issue_pair(config: &TokenConfig, user: &User) -> Result<TokenPair, ApiError> {
    Ok(TokenPair {
        access_token: issue_access_token(config, user)?,
        refresh_token: issue_refresh_token(config, user.id)?,
    })
}

/// Issue a fresh pair and store the refresh token on the user, replacing any
/// previous one.
async fn start_session(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let tokens = issue_pair(&state.tokens, user)?;

    let id = user.id;
    let stored = tokens.refresh_token.clone();
    blocking(state, move |db| Ok(db.set_refresh_token(&id, Some(&stored))?)).await?;

    Ok(tokens)
}

fn with_session_cookies(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()))
}

// -- Handlers --

/// POST /users/register: multipart fullName, email, username, password,
/// avatar and an optional coverImage.
pub async fn register(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart).await?;

    let (Some(full_name), Some(email), Some(username), Some(password)) = (
        required(form.text("fullName")),
        required(form.text("email")),
        required(form.text("username")),
        required(form.text("password")),
    ) else {
        return Err(ApiError::validation("All fields are required"));
    };
    let username = username.to_lowercase();
    let email = email.to_lowercase();

    let avatar = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::validation("Avatar file is required"))?;
    let cover = form.take_file("coverImage");

    let (u, e) = (username.clone(), email.clone());
    let taken = blocking(&state, move |db| {
        Ok(db.get_user_by_username(&u)?.is_some() || db.get_user_by_email(&e)?.is_some())
    })
    .await?;
    if taken {
        return Err(ApiError::conflict("User with email or username already exists"));
    }

    let avatar = store_upload(state.media.as_ref(), avatar, MediaKind::Image).await?;
    let cover = match cover {
        Some(upload) => Some(store_upload(state.media.as_ref(), upload, MediaKind::Image).await?),
        None => None,
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        full_name,
        avatar: avatar.url.clone(),
        avatar_public_id: avatar.public_id.clone(),
        cover_image: cover.as_ref().map(|c| c.url.clone()).unwrap_or_default(),
        cover_image_public_id: cover.as_ref().map(|c| c.public_id.clone()),
        watch_history: Vec::new(),
        password,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };

    let created = blocking(&state, move |db| {
        let mut user = user;
        user.password = hash_password(&user.password)?;
        match db.create_user(&user) {
            Ok(doc) => Ok(doc),
            Err(StoreError::Conflict(_)) => Err(ApiError::conflict("User with email or username already exists")),
            Err(e) => Err(e.into()),
        }
    })
    .await;

    let mut assets = vec![(avatar.public_id.as_str(), MediaKind::Image)];
    if let Some(cover) = &cover {
        assets.push((cover.public_id.as_str(), MediaKind::Image));
    }
    let created = discard_on_error(state.media.as_ref(), &assets, created).await?;

    info!("Registered user {:?}", created.get("username"));
    Ok(crate::reply::created(public_profile(created), "User registered successfully"))
}

/// POST /users/login: username or email plus password.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required(req.username.as_deref()).map(|u| u.to_lowercase());
    let email = required(req.email.as_deref()).map(|e| e.to_lowercase());
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("Username or email is required"));
    }

    let password = req.password;
    let user = blocking(&state, move |db| {
        let user = match (&username, &email) {
            (Some(username), _) => db.get_user_by_username(username)?,
            (None, Some(email)) => db.get_user_by_email(email)?,
            (None, None) => None,
        };
        let user = user.ok_or_else(|| ApiError::missing("User"))?;
        if !verify_password(&password, &user.password) {
            return Err(ApiError::auth("Invalid user credentials"));
        }
        Ok(user)
    })
    .await?;

    let tokens = start_session(&state, &user).await?;
    info!("User {} logged in", user.username);

    let profile = public_profile(tubeway_db::models::to_document(&user)?);
    let jar = with_session_cookies(jar, &tokens);
    Ok((
        jar,
        ok(
            LoginResponse {
                user: profile.into(),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

/// POST /users/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let id = user.id;
    blocking(&state, move |db| Ok(db.set_refresh_token(&id, None)?)).await?;

    // Sent whether or not the request carried the cookies.
    let jar = jar.add(cleared_cookie(ACCESS_COOKIE)).add(cleared_cookie(REFRESH_COOKIE));
    Ok((jar, ok(empty(), "User logged out")))
}

/// POST /users/refresh-token: the refresh token comes from the cookie or the
/// JSON body. Both tokens are rotated, and a given refresh token can be
/// exchanged at most once.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|_| ApiError::validation("Request body must be a JSON object"))?
    };
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(from_body.refresh_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::auth("Unauthorized request"))?;

    let claims = verify_refresh_token(&state.tokens, &token).ok_or_else(|| ApiError::auth("Invalid refresh token"))?;

    let user = blocking(&state, move |db| {
        db.get_user(&claims.sub)?
            .ok_or_else(|| ApiError::auth("Invalid refresh token"))
    })
    .await?;

    let tokens = issue_pair(&state.tokens, &user)?;
    let (id, next) = (user.id, tokens.refresh_token.clone());
    let rotated = blocking(&state, move |db| Ok(db.rotate_refresh_token(&id, &token, &next)?)).await?;
    if !rotated {
        return Err(ApiError::auth("Refresh token is expired or used"));
    }

    info!("Rotated session for {}", user.username);
    let jar = with_session_cookies(jar, &tokens);
    Ok((jar, ok(tokens, "Access token refreshed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig {
            access_secret: "access-secret-for-tests".into(),
            access_ttl_secs: 60,
            refresh_secret: "refresh-secret-for-tests".into(),
            refresh_ttl_secs: 600,
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            full_name: "Ada Lovelace".into(),
            avatar: String::new(),
            avatar_public_id: String::new(),
            cover_image: String::new(),
            cover_image_public_id: None,
            watch_history: Vec::new(),
            password: String::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn passwords_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not a hash"));
    }

    #[test]
    fn access_tokens_carry_the_profile() {
        let config = config();
        let user = user();
        let token = issue_access_token(&config, &user).unwrap();
        let claims = verify_access_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.full_name, "Ada Lovelace");
    }

    #[test]
    fn token_kinds_do_not_cross_verify() {
        let config = config();
        let user = user();
        let access = issue_access_token(&config, &user).unwrap();
        let refresh = issue_refresh_token(&config, user.id).unwrap();
        assert!(verify_refresh_token(&config, &access).is_none());
        assert!(verify_access_token(&config, &refresh).is_none());
        assert_eq!(verify_refresh_token(&config, &refresh).unwrap().sub, user.id);
    }

    #[test]
    fn refresh_tokens_differ_per_issue() {
        let config = config();
        let id = Uuid::new_v4();
        assert_ne!(issue_refresh_token(&config, id).unwrap(), issue_refresh_token(&config, id).unwrap());
    }
}
