use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use tubeway_db::models::to_document;
use tubeway_db::{Collection, Document, DocumentStore, Filter, PageOutcome, Pipeline, Shape, Sort};
use tubeway_types::api::{ContentRequest, PageQuery};
use tubeway_types::models::Tweet;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{created, empty, ok, page_of, parse_id, required};
use crate::state::{AppState, blocking};
use crate::users::owner_relation;

fn tweets_by(owner: &Uuid) -> Pipeline {
    Pipeline::new(Collection::Tweets)
        .filter(Filter::all().eq("owner", owner.to_string()))
        .sort(Sort::desc("createdAt"))
        .relate(owner_relation())
        .shape(
            Shape::new()
                .keep_all(["_id", "content", "createdAt"])
                .rename("username", "owner.username")
                .rename("fullName", "owner.fullName")
                .rename("avatar", "owner.avatar"),
        )
}

/// POST /tweets
pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ContentRequest>,
) -> Result<Response, ApiError> {
    let content = required(req.content.as_deref()).ok_or_else(|| ApiError::validation("Content is required"))?;

    let now = Utc::now();
    let tweet = Tweet {
        id: Uuid::new_v4(),
        owner: user.id,
        content,
        created_at: now,
        updated_at: now,
    };
    let doc = to_document(&tweet)?;

    let created_doc = blocking(&state, move |db| Ok(db.insert(Collection::Tweets, doc)?)).await?;
    Ok(created(created_doc, "Tweet created successfully"))
}

/// GET /tweets: the caller's own tweets.
pub async fn current_user_tweets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let pipeline = tweets_by(&user.id);
    let tweets = blocking(&state, move |db| Ok(pipeline.run(db)?)).await?;

    if tweets.is_empty() {
        Ok(ok(empty(), "User does not have any tweets"))
    } else {
        Ok(ok(tweets, "All tweets fetched successfully"))
    }
}

/// GET /tweets/user/{userId}
pub async fn user_tweets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let user_id = parse_id(&user_id, "User")?;
    let page = page_of(&query);
    let pipeline = tweets_by(&user_id);

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "All tweets fetched successfully")),
        PageOutcome::Empty => Ok(ok(Value::Array(Vec::new()), "User does not have any tweets")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Tweets exhausted")),
    }
}

/// PATCH /tweets/{tweetId}
pub async fn update_tweet(
    State(state): State<AppState>,
    Path(tweet_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ContentRequest>,
) -> Result<Response, ApiError> {
    let tweet_id = parse_id(&tweet_id, "Tweet")?;
    let content = required(req.content.as_deref()).ok_or_else(|| ApiError::validation("Content is required"))?;

    let updated = blocking(&state, move |db| {
        db.find_owned(Collection::Tweets, &tweet_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Tweet"))?;
        let mut patch = Document::new();
        patch.insert("content".into(), Value::String(content));
        Ok(db.update_by_id(Collection::Tweets, &tweet_id.to_string(), patch)?)
    })
    .await?;

    Ok(ok(updated, "Tweet updated successfully"))
}

/// DELETE /tweets/{tweetId}: also removes the tweet's likes.
pub async fn delete_tweet(
    State(state): State<AppState>,
    Path(tweet_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let tweet_id = parse_id(&tweet_id, "Tweet")?;

    blocking(&state, move |db| {
        db.find_owned(Collection::Tweets, &tweet_id, &user.id)?
            .ok_or_else(|| ApiError::missing("Tweet"))?;
        Ok(db.delete_tweet_cascade(&tweet_id)?)
    })
    .await?;

    Ok(ok(empty(), "Tweet deleted successfully"))
}
