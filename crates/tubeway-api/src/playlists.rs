use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use tubeway_db::models::to_document;
use tubeway_db::{Collection, Document, DocumentStore, Filter, PageOutcome, Pipeline, Relation, Shape, Sort, StoreError};
use tubeway_types::api::{PageQuery, PlaylistRequest};
use tubeway_types::models::Playlist;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{created, empty, ok, page_of, parse_id, required};
use crate::state::{AppState, blocking};
use crate::users::owner_relation;

const DUPLICATE: &str = "Playlist already exist";

/// POST /playlist
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PlaylistRequest>,
) -> Result<Response, ApiError> {
    let name = required(req.name.as_deref()).ok_or_else(|| ApiError::validation("All fields are required"))?;
    let description = req.description.map(|d| d.trim().to_string()).unwrap_or_default();

    let now = Utc::now();
    let playlist = Playlist {
        id: Uuid::new_v4(),
        name,
        description,
        owner: user.id,
        videos: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let doc = to_document(&playlist)?;

    let created_doc = blocking(&state, move |db| match db.insert(Collection::Playlists, doc) {
        Err(StoreError::Conflict(_)) => Err(ApiError::conflict(DUPLICATE)),
        other => Ok(other?),
    })
    .await?;

    Ok(created(created_doc, "Playlist created successfully"))
}

/// GET /playlist/user/{userId}
pub async fn user_playlists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let user_id = parse_id(&user_id, "User")?;
    let pipeline = Pipeline::new(Collection::Playlists)
        .filter(Filter::all().eq("owner", user_id.to_string()))
        .sort(Sort::desc("createdAt"));

    let playlists = blocking(&state, move |db| Ok(pipeline.run(db)?)).await?;
    Ok(ok(playlists, "User playlists fetched successfully"))
}

/// One row per video in the playlist, in playlist order, each carrying the
/// playlist's name and owner.
pub fn playlist_videos(playlist_id: &Uuid) -> Pipeline {
    Pipeline::new(Collection::Playlists)
        .filter(Filter::by_id(playlist_id.to_string()))
        .relate(
            Relation::new("videos", Collection::Videos, "playlistVideos")
                .project(["thumbnail", "title", "description", "views"]),
        )
        .relate(owner_relation())
        .shape(
            Shape::new()
                .rename("_id", "playlistVideos._id")
                .keep_all(["name", "description"])
                .rename("thumbnail", "playlistVideos.thumbnail")
                .rename("videoTitle", "playlistVideos.title")
                .rename("videoDescription", "playlistVideos.description")
                .rename("views", "playlistVideos.views")
                .rename("username", "owner.username")
                .rename("fullName", "owner.fullName")
                .rename("avatar", "owner.avatar")
                .unwind("playlistVideos"),
        )
}

/// GET /playlist/{playlistId}: an empty playlist is a success with `{}`,
/// distinct from an unknown playlist.
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Playlist")?;
    let page = page_of(&query);
    let pipeline = playlist_videos(&playlist_id);

    let outcome = blocking(&state, move |db| {
        if db.find_by_id(Collection::Playlists, &playlist_id.to_string())?.is_none() {
            return Err(ApiError::missing("Playlist"));
        }
        Ok(pipeline.run_page(db, page)?)
    })
    .await?;

    match outcome {
        PageOutcome::Rows(rows) => Ok(ok(rows, "Playlist details fetched successfully")),
        PageOutcome::Empty => Ok(ok(empty(), "Playlist does not have videos yet")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Playlist videos exhausted")),
    }
}

/// PATCH /playlist/{playlistId}
pub async fn update_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PlaylistRequest>,
) -> Result<Response, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Playlist")?;

    let mut patch = Document::new();
    if let Some(name) = req.name.as_deref() {
        let name = required(Some(name)).ok_or_else(|| ApiError::validation("All fields are required"))?;
        patch.insert("name".into(), Value::String(name));
    }
    if let Some(description) = req.description {
        patch.insert("description".into(), Value::String(description.trim().to_string()));
    }
    if patch.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }

    let updated = blocking(&state, move |db| {
        db.find_owned(Collection::Playlists, &playlist_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Playlist"))?;
        match db.update_by_id(Collection::Playlists, &playlist_id.to_string(), patch) {
            Err(StoreError::Conflict(_)) => Err(ApiError::conflict(DUPLICATE)),
            other => Ok(other?),
        }
    })
    .await?;

    Ok(ok(updated, "Playlist updated successfully"))
}

/// DELETE /playlist/{playlistId}
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Playlist")?;

    blocking(&state, move |db| {
        db.find_owned(Collection::Playlists, &playlist_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Playlist"))?;
        Ok(db.delete_by_id(Collection::Playlists, &playlist_id.to_string())?)
    })
    .await?;

    Ok(ok(empty(), "Playlist deleted successfully"))
}

/// PATCH /playlist/add/{videoId}/{playlistId}
pub async fn add_video(
    State(state): State<AppState>,
    Path((video_id, playlist_id)): Path<(String, String)>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let (video_id, playlist_id) = parse_pair(&video_id, &playlist_id)?;

    let updated = blocking(&state, move |db| {
        db.find_owned(Collection::Playlists, &playlist_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Playlist"))?;
        if db.find_by_id(Collection::Videos, &video_id.to_string())?.is_none() {
            return Err(ApiError::missing("Video"));
        }
        Ok(db.add_to_set(
            Collection::Playlists,
            &playlist_id.to_string(),
            "videos",
            Value::String(video_id.to_string()),
        )?)
    })
    .await?;

    Ok(ok(updated, "Video added to playlist successfully"))
}

/// PATCH /playlist/remove/{videoId}/{playlistId}
pub async fn remove_video(
    State(state): State<AppState>,
    Path((video_id, playlist_id)): Path<(String, String)>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let (video_id, playlist_id) = parse_pair(&video_id, &playlist_id)?;

    blocking(&state, move |db| {
        db.find_owned(Collection::Playlists, &playlist_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Playlist"))?;
        let (_, removed) = db.pull(
            Collection::Playlists,
            &playlist_id.to_string(),
            "videos",
            &Value::String(video_id.to_string()),
        )?;
        if removed {
            Ok(())
        } else {
            Err(ApiError::not_found("Video does not exist in the playlist"))
        }
    })
    .await?;

    Ok(ok(empty(), "Video removed from playlist successfully"))
}

fn parse_pair(video_id: &str, playlist_id: &str) -> Result<(Uuid, Uuid), ApiError> {
    let both = parse_id(video_id, "Video").and_then(|v| parse_id(playlist_id, "Playlist").map(|p| (v, p)));
    both.map_err(|_| ApiError::missing("Playlist or video"))
}
