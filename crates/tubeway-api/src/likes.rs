use axum::{
    Extension,
    extract::{Path, State},
    response::Response,
};

use tubeway_db::{Collection, DocumentStore, Filter, Pipeline, Relation, Shape, Sort, Toggle};
use tubeway_types::models::{LikeKind, LikeTarget};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{empty, ok, parse_id};
use crate::state::{AppState, blocking};
use crate::users::owner_relation;

/// POST /likes/toggle/v/{videoId}
pub async fn toggle_video_like(
    state: State<AppState>,
    Path(video_id): Path<String>,
    user: Extension<AuthUser>,
) -> Result<Response, ApiError> {
    toggle(state, user, LikeKind::Video, &video_id).await
}

/// POST /likes/toggle/c/{commentId}
pub async fn toggle_comment_like(
    state: State<AppState>,
    Path(comment_id): Path<String>,
    user: Extension<AuthUser>,
) -> Result<Response, ApiError> {
    toggle(state, user, LikeKind::Comment, &comment_id).await
}

/// POST /likes/toggle/t/{tweetId}
pub async fn toggle_tweet_like(
    state: State<AppState>,
    Path(tweet_id): Path<String>,
    user: Extension<AuthUser>,
) -> Result<Response, ApiError> {
    toggle(state, user, LikeKind::Tweet, &tweet_id).await
}

async fn toggle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    kind: LikeKind,
    raw_id: &str,
) -> Result<Response, ApiError> {
    let (collection, what, message) = match kind {
        LikeKind::Video => (Collection::Videos, "Video", "Like toggled on video successfully"),
        LikeKind::Comment => (Collection::Comments, "Comment", "Like toggled on comment successfully"),
        LikeKind::Tweet => (Collection::Tweets, "Tweet", "Like toggled on tweet successfully"),
    };
    let target = LikeTarget {
        kind,
        id: parse_id(raw_id, what)?,
    };

    let toggled = blocking(&state, move |db| {
        if db.find_by_id(collection, &target.id.to_string())?.is_none() {
            return Err(ApiError::missing(what));
        }
        Ok(db.toggle_like(target, &user.id)?)
    })
    .await?;

    match toggled {
        Toggle::Created(like) => Ok(ok(like, message)),
        Toggle::Removed(_) => Ok(ok(empty(), message)),
    }
}

/// GET /likes/videos: videos the caller liked, most recent like first.
pub async fn liked_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let pipeline = Pipeline::new(Collection::Likes)
        .filter(
            Filter::all()
                .eq("likedBy", user.id.to_string())
                .eq("target.kind", LikeKind::Video.as_str()),
        )
        .sort(Sort::desc("createdAt"))
        .relate(
            Relation::new("target.id", Collection::Videos, "likedVideo")
                .project(["title", "description", "thumbnail", "views"])
                .nest(owner_relation()),
        )
        .shape(
            Shape::new()
                .rename("_id", "likedVideo._id")
                .rename("thumbnail", "likedVideo.thumbnail")
                .rename("title", "likedVideo.title")
                .rename("description", "likedVideo.description")
                .rename("views", "likedVideo.views")
                .rename("fullName", "likedVideo.owner.fullName")
                .rename("username", "likedVideo.owner.username")
                .rename("avatar", "likedVideo.owner.avatar")
                .unwind("likedVideo"),
        );

    let rows = blocking(&state, move |db| Ok(pipeline.run(db)?)).await?;
    Ok(ok(rows, "All videos liked by the user fetched successfully"))
}
