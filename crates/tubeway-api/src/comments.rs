use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use tubeway_db::models::to_document;
use tubeway_db::{Collection, Document, DocumentStore, Filter, PageOutcome, Pipeline, Relation, Shape, Sort};
use tubeway_types::api::{ContentRequest, PageQuery};
use tubeway_types::models::Comment;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{created, empty, ok, page_of, parse_id, required};
use crate::state::{AppState, blocking};
use crate::users::owner_relation;

/// Comments on a video, newest first, each with its author and the video
/// (and the video's channel) it belongs to.
pub fn video_comments(video_id: &Uuid) -> Pipeline {
    Pipeline::new(Collection::Comments)
        .filter(Filter::all().eq("video", video_id.to_string()))
        .sort(Sort::desc("createdAt"))
        .relate(owner_relation())
        .relate(
            Relation::new("video", Collection::Videos, "video")
                .project(["title", "description", "views", "thumbnail"])
                .nest(Relation::new("owner", Collection::Users, "owner").project(["username"])),
        )
        .shape(
            Shape::new()
                .keep_all(["_id", "content", "createdAt"])
                .rename("username", "owner.username")
                .rename("fullName", "owner.fullName")
                .rename("avatar", "owner.avatar")
                .rename("videoTitle", "video.title")
                .rename("videoDescription", "video.description")
                .rename("views", "video.views")
                .rename("thumbnail", "video.thumbnail")
                .rename("channel", "video.owner.username"),
        )
}

/// GET /comments/{videoId}
pub async fn get_video_comments(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;
    let page = page_of(&query);
    let pipeline = video_comments(&video_id);

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "Comments fetched successfully")),
        PageOutcome::Empty => Err(ApiError::not_found("No comments found for this video")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Comments exhausted")),
    }
}

/// POST /comments/{videoId}
pub async fn add_comment(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ContentRequest>,
) -> Result<Response, ApiError> {
    let video_id = parse_id(&video_id, "Video")?;
    let content = required(req.content.as_deref()).ok_or_else(|| ApiError::validation("Content is required"))?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        content,
        video: video_id,
        owner: user.id,
        created_at: now,
        updated_at: now,
    };
    let doc = to_document(&comment)?;

    let created_doc = blocking(&state, move |db| {
        if db.find_by_id(Collection::Videos, &video_id.to_string())?.is_none() {
            return Err(ApiError::missing("Video"));
        }
        Ok(db.insert(Collection::Comments, doc)?)
    })
    .await?;

    Ok(created(created_doc, "Comment added successfully"))
}

/// PATCH /comments/c/{commentId}
pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ContentRequest>,
) -> Result<Response, ApiError> {
    let comment_id = parse_id(&comment_id, "Comment")?;
    let content = required(req.content.as_deref()).ok_or_else(|| ApiError::validation("Content is required"))?;

    let updated = blocking(&state, move |db| {
        db.find_owned(Collection::Comments, &comment_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Comment"))?;
        let mut patch = Document::new();
        patch.insert("content".into(), Value::String(content));
        Ok(db.update_by_id(Collection::Comments, &comment_id.to_string(), patch)?)
    })
    .await?;

    Ok(ok(updated, "Comment updated successfully"))
}

/// DELETE /comments/c/{commentId}: also removes the comment's likes.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let comment_id = parse_id(&comment_id, "Comment")?;

    blocking(&state, move |db| {
        db.find_owned(Collection::Comments, &comment_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Comment"))?;
        Ok(db.delete_comment_cascade(&comment_id)?)
    })
    .await?;

    Ok(ok(empty(), "Comment deleted successfully"))
}
