use axum::{
    Extension,
    extract::{Multipart, Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use tubeway_db::models::{from_document, to_document};
use tubeway_db::{Collection, Document, DocumentStore, Filter, PageOutcome, Pipeline, Shape, Sort};
use tubeway_types::api::VideoListQuery;
use tubeway_types::models::Video;

use crate::error::ApiError;
use crate::media::{Form, MediaKind, discard, discard_on_error, store_upload};
use crate::middleware::AuthUser;
use crate::reply::{created, empty, ok, parse_id, required};
use crate::state::{AppState, blocking};
use crate::users::owner_relation;

/// GET /videos: search by title / description, caller-chosen sort, paged.
pub async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<VideoListQuery>,
) -> Result<Response, ApiError> {
    let page = tubeway_db::PageRequest::parse(query.page.as_deref(), query.limit.as_deref());

    let mut filter = Filter::all();
    if let Some(title) = required(query.title.as_deref()) {
        filter = filter.contains("title", title);
    }
    if let Some(description) = required(query.description.as_deref()) {
        filter = filter.contains("description", description);
    }

    let sort_by = required(query.sort_by.as_deref()).unwrap_or_else(|| "createdAt".to_string());
    let sort = match query.sort_type.as_deref() {
        Some("desc") => Sort::desc(sort_by),
        _ => Sort::asc(sort_by),
    };

    let pipeline = Pipeline::new(Collection::Videos)
        .filter(filter)
        .sort(sort)
        .relate(owner_relation())
        .shape(
            Shape::new()
                .keep_all(["_id", "title", "description", "thumbnail", "duration", "views", "createdAt"])
                .rename("fullName", "owner.fullName")
                .rename("username", "owner.username")
                .rename("avatar", "owner.avatar"),
        );

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "Videos fetched successfully")),
        PageOutcome::Empty => Err(ApiError::not_found("No video found")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Videos exhausted")),
    }
}

/// POST /videos: multipart title, description, videoFile and thumbnail.
pub async fn publish_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart).await?;

    let (Some(title), Some(description)) = (required(form.text("title")), required(form.text("description"))) else {
        return Err(ApiError::validation("All fields are required"));
    };
    let duration = form
        .text("duration")
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or_default();

    let video_file = form
        .take_file("videoFile")
        .or_else(|| form.take_file("video"))
        .ok_or_else(|| ApiError::validation("Video is required"))?;
    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::validation("Thumbnail is required"))?;

    let video_asset = store_upload(state.media.as_ref(), video_file, MediaKind::Video).await?;
    let thumbnail_asset = match store_upload(state.media.as_ref(), thumbnail, MediaKind::Image).await {
        Ok(asset) => asset,
        Err(e) => {
            discard(state.media.as_ref(), &video_asset.public_id, MediaKind::Video).await;
            return Err(e);
        }
    };

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4(),
        owner: user.id,
        title,
        description,
        video_file: video_asset.url.clone(),
        video_file_public_id: video_asset.public_id.clone(),
        thumbnail: thumbnail_asset.url.clone(),
        thumbnail_public_id: thumbnail_asset.public_id.clone(),
        duration,
        views: 0,
        is_published: true,
        created_at: now,
        updated_at: now,
    };

    let doc = to_document(&video)?;
    let inserted = blocking(&state, move |db| Ok(db.insert(Collection::Videos, doc)?)).await;
    let assets = [
        (video_asset.public_id.as_str(), MediaKind::Video),
        (thumbnail_asset.public_id.as_str(), MediaKind::Image),
    ];
    let doc = discard_on_error(state.media.as_ref(), &assets, inserted).await?;

    info!("User {} published video {}", user.username, video.id);
    Ok(created(doc, "Video published successfully"))
}

/// GET /videos/{videoId}: counts a view and records it in the viewer's
/// watch history before returning the video with its owner.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Extension(viewer): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;

    let pipeline = Pipeline::new(Collection::Videos)
        .filter(Filter::by_id(video_id.to_string()))
        .relate(owner_relation())
        .shape(
            Shape::new()
                .keep_all([
                    "_id",
                    "videoFile",
                    "thumbnail",
                    "title",
                    "description",
                    "duration",
                    "views",
                    "isPublished",
                    "createdAt",
                ])
                .rename("owner", "owner._id")
                .rename("fullName", "owner.fullName")
                .rename("username", "owner.username")
                .rename("avatar", "owner.avatar"),
        );

    let video = blocking(&state, move |db| {
        db.record_view(&video_id, &viewer.id)?;
        pipeline
            .run(db)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::missing("Video"))
    })
    .await?;

    Ok(ok(video, "Video fetched successfully"))
}

/// PATCH /videos/{videoId}: multipart title / description, optional new
/// thumbnail. The old thumbnail is deleted once the new one is stored.
pub async fn update_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;
    let mut form = Form::read(multipart).await?;

    let title = required(form.text("title"));
    let description = required(form.text("description"));
    let thumbnail = form.take_file("thumbnail");
    if title.is_none() && description.is_none() && thumbnail.is_none() {
        return Err(ApiError::validation("All fields are required"));
    }

    let existing = owned_video(&state, video_id, user.id).await?;

    let mut patch = Document::new();
    if let Some(title) = title {
        patch.insert("title".into(), Value::String(title));
    }
    if let Some(description) = description {
        patch.insert("description".into(), Value::String(description));
    }
    let uploaded = match thumbnail {
        Some(upload) => {
            let asset = store_upload(state.media.as_ref(), upload, MediaKind::Image).await?;
            patch.insert("thumbnail".into(), Value::String(asset.url));
            patch.insert("thumbnailPublicId".into(), Value::String(asset.public_id.clone()));
            Some(asset.public_id)
        }
        None => None,
    };

    let id = video_id.to_string();
    let result = blocking(&state, move |db| Ok(db.update_by_id(Collection::Videos, &id, patch)?)).await;
    let assets: Vec<_> = uploaded.iter().map(|id| (id.as_str(), MediaKind::Image)).collect();
    let updated = discard_on_error(state.media.as_ref(), &assets, result).await?;

    if uploaded.is_some() {
        discard(state.media.as_ref(), &existing.thumbnail_public_id, MediaKind::Image).await;
    }
    Ok(ok(updated, "Video updated successfully"))
}

/// DELETE /videos/{videoId}: removes the video, its comments, every like on
/// either, and both media files.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;
    owned_video(&state, video_id, user.id).await?;

    let deleted = blocking(&state, move |db| Ok(db.delete_video_cascade(&video_id)?)).await?;
    let video: Video = from_document(deleted)?;

    discard(state.media.as_ref(), &video.video_file_public_id, MediaKind::Video).await;
    discard(state.media.as_ref(), &video.thumbnail_public_id, MediaKind::Image).await;

    info!("User {} deleted video {}", user.username, video.id);
    Ok(ok(empty(), "Video deleted successfully"))
}

/// PATCH /videos/toggle/publish/{videoId}
pub async fn toggle_publish(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;
    owned_video(&state, video_id, user.id).await?;

    let id = video_id.to_string();
    let updated = blocking(&state, move |db| Ok(db.toggle_flag(Collection::Videos, &id, "isPublished")?)).await?;
    Ok(ok(updated, "Publish status toggled successfully"))
}

async fn owned_video(state: &AppState, video_id: Uuid, owner: Uuid) -> Result<Video, ApiError> {
    blocking(state, move |db| {
        let doc = db
            .find_owned(Collection::Videos, &video_id, &owner)?
            .ok_or_else(|| ApiError::missing("Video"))?;
        Ok(from_document(doc)?)
    })
    .await
}
