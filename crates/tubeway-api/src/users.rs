use axum::{
    Extension,
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::{Value, json};

use tubeway_db::{Collection, Document, DocumentStore, Filter, PageOutcome, Pipeline, Relation, Shape};
use tubeway_types::api::PageQuery;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{ok, page_of};
use crate::state::{AppState, blocking};

/// Drop credentials before a user document leaves the server.
pub fn public_profile(mut user: Document) -> Document {
    user.remove("password");
    user.remove("refreshToken");
    user
}

/// The owner attachment most listings use.
pub fn owner_relation() -> Relation {
    Relation::new("owner", Collection::Users, "owner").project(["username", "fullName", "avatar"])
}

/// GET /users/current-user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let id = user.id.to_string();
    let doc = blocking(&state, move |db| {
        db.find_by_id(Collection::Users, &id)?
            .ok_or_else(|| ApiError::missing("User"))
    })
    .await?;
    Ok(ok(public_profile(doc), "Current user fetched successfully"))
}

/// GET /users/c/{username}: a channel with its subscriber counts and whether
/// the caller subscribes to it.
pub async fn channel_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(viewer): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::validation("Username is missing"));
    }

    let profile = blocking(&state, move |db| {
        let channel = db
            .get_user_by_username(&username)?
            .ok_or_else(|| ApiError::missing("Channel"))?;
        let channel_id = channel.id.to_string();

        let subscribers = db.count(Collection::Subscriptions, &Filter::all().eq("channel", channel_id.as_str()))?;
        let subscribed_to = db.count(Collection::Subscriptions, &Filter::all().eq("subscriber", channel_id.as_str()))?;
        let is_subscribed = db.is_subscribed(&viewer.id, &channel.id)?;

        Ok(json!({
            "_id": channel.id,
            "fullName": channel.full_name,
            "username": channel.username,
            "email": channel.email,
            "avatar": channel.avatar,
            "coverImage": channel.cover_image,
            "subscribersCount": subscribers,
            "channelsSubscribedToCount": subscribed_to,
            "isSubscribed": is_subscribed,
        }))
    })
    .await?;

    Ok(ok(profile, "User channel fetched successfully"))
}

/// GET /users/history: watched videos in watch order, each with its owner.
pub async fn watch_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = page_of(&query);
    let pipeline = Pipeline::new(Collection::Users)
        .filter(Filter::by_id(user.id.to_string()))
        .relate(
            Relation::new("watchHistory", Collection::Videos, "watchHistory")
                .project(["title", "description", "thumbnail", "duration", "views"])
                .nest(owner_relation()),
        )
        .shape(
            Shape::new()
                .rename("_id", "watchHistory._id")
                .rename("title", "watchHistory.title")
                .rename("description", "watchHistory.description")
                .rename("thumbnail", "watchHistory.thumbnail")
                .rename("duration", "watchHistory.duration")
                .rename("views", "watchHistory.views")
                .rename("username", "watchHistory.owner.username")
                .rename("fullName", "watchHistory.owner.fullName")
                .rename("avatar", "watchHistory.owner.avatar")
                .unwind("watchHistory"),
        );

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "Watch history fetched successfully")),
        PageOutcome::Empty => Ok(ok(Value::Array(Vec::new()), "Watch history is empty")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Watch history exhausted")),
    }
}
