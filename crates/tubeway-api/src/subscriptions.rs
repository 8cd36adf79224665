use axum::{
    Extension,
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use tubeway_db::{Collection, Filter, PageOutcome, Pipeline, Relation, Shape, Sort, Toggle};
use tubeway_types::api::PageQuery;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::{empty, ok, page_of, parse_id};
use crate::state::{AppState, blocking};

/// POST /subscriptions/c/{channelId}: subscribe, or unsubscribe when already
/// subscribed.
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let channel_id = parse_id(&channel_id, "Channel")?;
    if channel_id == user.id {
        return Err(ApiError::validation("You cannot subscribe to your own channel"));
    }

    let toggled = blocking(&state, move |db| {
        if db.get_user(&channel_id)?.is_none() {
            return Err(ApiError::missing("Channel"));
        }
        Ok(db.toggle_subscription(&user.id, &channel_id)?)
    })
    .await?;

    match toggled {
        Toggle::Created(subscription) => Ok(ok(subscription, "Subscribed to channel successfully")),
        Toggle::Removed(_) => {
            debug!("Subscription to {} removed", channel_id);
            Ok(ok(empty(), "Subscription removed successfully"))
        }
    }
}

/// Users on the `side` of a subscription (`subscriber` or `channel`) whose
/// other side is `id`, newest subscription first.
fn linked_users(match_field: &str, id: &Uuid, side: &str) -> Pipeline {
    Pipeline::new(Collection::Subscriptions)
        .filter(Filter::all().eq(match_field, id.to_string()))
        .sort(Sort::desc("createdAt"))
        .relate(Relation::new(side, Collection::Users, side).project(["username", "fullName", "avatar"]))
        .shape(
            Shape::new()
                .rename("_id", format!("{}._id", side))
                .rename("username", format!("{}.username", side))
                .rename("fullName", format!("{}.fullName", side))
                .rename("avatar", format!("{}.avatar", side))
                .unwind(side),
        )
}

/// GET /subscriptions/c/{channelId}: the channel's subscribers.
pub async fn channel_subscribers(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let channel_id = parse_id(&channel_id, "Channel")?;
    let page = page_of(&query);
    let pipeline = linked_users("channel", &channel_id, "subscriber");

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "All subscribers of the channel fetched successfully")),
        PageOutcome::Empty => Ok(ok(Value::Array(Vec::new()), "Channel has no subscribers yet")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Subscribers exhausted")),
    }
}

/// GET /subscriptions/u/{subscriberId}: channels the user subscribes to.
pub async fn subscribed_channels(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let subscriber_id = parse_id(&subscriber_id, "User")?;
    let page = page_of(&query);
    let pipeline = linked_users("subscriber", &subscriber_id, "channel");

    match blocking(&state, move |db| Ok(pipeline.run_page(db, page)?)).await? {
        PageOutcome::Rows(rows) => Ok(ok(rows, "Fetched all user channel subscription")),
        PageOutcome::Empty => Ok(ok(Value::Array(Vec::new()), "User has not subscribed to any channel")),
        PageOutcome::Exhausted => Err(ApiError::not_found("Subscribed channels exhausted")),
    }
}
