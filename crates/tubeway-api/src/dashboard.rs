use axum::{
    Extension,
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use tubeway_db::{Collection, Filter, Pipeline, Relation, Shape, Sort};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{ok, parse_id};
use crate::state::{AppState, blocking};

/// GET /dashboard/stats
pub async fn channel_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let stats = blocking(&state, move |db| Ok(db.channel_stats(&user.id)?)).await?;
    Ok(ok(stats, "All channel stats fetched successfully"))
}

fn channel_videos_of(owner: &Uuid) -> Pipeline {
    Pipeline::new(Collection::Videos)
        .filter(Filter::all().eq("owner", owner.to_string()))
        .sort(Sort::desc("createdAt"))
        .relate(
            Relation::new("owner", Collection::Users, "owner").project(["username", "fullName", "avatar", "coverImage"]),
        )
        .shape(
            Shape::new()
                .keep_all(["_id", "thumbnail", "title", "description", "views", "isPublished", "createdAt"])
                .rename("username", "owner.username")
                .rename("fullName", "owner.fullName")
                .rename("avatar", "owner.avatar")
                .rename("coverImage", "owner.coverImage"),
        )
}

/// GET /dashboard/videos: the caller's own uploads.
pub async fn own_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let pipeline = channel_videos_of(&user.id);
    let videos = blocking(&state, move |db| Ok(pipeline.run(db)?)).await?;
    Ok(ok(videos, "All videos of the channel fetched successfully"))
}

/// GET /dashboard/videos/channel/{channelId}
pub async fn channel_videos(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Response, ApiError> {
    let channel_id = parse_id(&channel_id, "Channel")?;
    let pipeline = channel_videos_of(&channel_id);

    let videos = blocking(&state, move |db| {
        if db.get_user(&channel_id)?.is_none() {
            return Err(ApiError::missing("Channel"));
        }
        Ok(pipeline.run(db)?)
    })
    .await?;
    Ok(ok(videos, "All videos of the channel fetched successfully"))
}
