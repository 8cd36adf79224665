use chrono::Utc;
use rusqlite::{Connection, params};
use serde_json::Value;
use uuid::Uuid;

use tubeway_types::api::ChannelStats;
use tubeway_types::models::{Like, LikeKind, LikeTarget, Subscription, User, timestamp};

use crate::models::{Document, from_document, to_document};
use crate::store::{self, DocumentStore, Filter, Toggle};
use crate::{Collection, Database, StoreError};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &User) -> Result<Document, StoreError> {
        self.insert(Collection::Users, to_document(user)?)
    }

    pub fn get_user(&self, id: &Uuid) -> Result<Option<User>, StoreError> {
        self.find_by_id(Collection::Users, &id.to_string())?
            .map(from_document)
            .transpose()
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one(Collection::Users, &Filter::all().eq("username", username))?
            .map(from_document)
            .transpose()
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one(Collection::Users, &Filter::all().eq("email", email))?
            .map(from_document)
            .transpose()
    }

    /// `None` clears the stored token.
    pub fn set_refresh_token(&self, id: &Uuid, token: Option<&str>) -> Result<(), StoreError> {
        let mut patch = Document::new();
        patch.insert("refreshToken".into(), token.map(Value::from).unwrap_or(Value::Null));
        self.update_by_id(Collection::Users, &id.to_string(), patch)?;
        Ok(())
    }

    /// Swap the stored refresh token from `current` to `next`. False when the
    /// stored token is no longer `current` (already rotated or cleared).
    pub fn rotate_refresh_token(&self, id: &Uuid, current: &str, next: &str) -> Result<bool, StoreError> {
        let now = timestamp::now();
        self.with_tx(|conn| {
            let sql = format!(
                "UPDATE {} SET doc = json_set(doc, '$.refreshToken', ?3, '$.updatedAt', ?4)
                 WHERE id = ?1 AND json_extract(doc, '$.refreshToken') = ?2",
                Collection::Users.table()
            );
            let changed = conn.execute(&sql, params![id.to_string(), current, next, now])?;
            Ok(changed == 1)
        })
    }

    // -- Ownership --

    /// The record with `id` in `collection`, only when `owner` owns it.
    pub fn find_owned(&self, collection: Collection, id: &Uuid, owner: &Uuid) -> Result<Option<Document>, StoreError> {
        let filter = Filter::by_id(id.to_string()).eq("owner", owner.to_string());
        self.find_one(collection, &filter)
    }

    // -- Likes --

    /// Like or unlike `target` on behalf of `user` in one transaction.
    pub fn toggle_like(&self, target: LikeTarget, user: &Uuid) -> Result<Toggle, StoreError> {
        let key = Filter::all()
            .eq("target.kind", target.kind.as_str())
            .eq("target.id", target.id.to_string())
            .eq("likedBy", user.to_string());
        let now = Utc::now();
        let like = Like {
            id: Uuid::new_v4(),
            target,
            liked_by: *user,
            created_at: now,
            updated_at: now,
        };
        self.toggle_link(Collection::Likes, &key, to_document(&like)?)
    }

    // -- Subscriptions --

    pub fn toggle_subscription(&self, subscriber: &Uuid, channel: &Uuid) -> Result<Toggle, StoreError> {
        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            subscriber: *subscriber,
            channel: *channel,
            created_at: now,
            updated_at: now,
        };
        self.toggle_link(
            Collection::Subscriptions,
            &subscription_key(subscriber, channel),
            to_document(&subscription)?,
        )
    }

    pub fn is_subscribed(&self, subscriber: &Uuid, channel: &Uuid) -> Result<bool, StoreError> {
        Ok(self.count(Collection::Subscriptions, &subscription_key(subscriber, channel))? > 0)
    }

    // -- Videos --

    /// Count a view and append the video to the viewer's watch history.
    /// A repeat view leaves the history order unchanged.
    pub fn record_view(&self, video_id: &Uuid, viewer: &Uuid) -> Result<Document, StoreError> {
        self.with_tx(|conn| {
            let video = store::increment_in(conn, Collection::Videos, &video_id.to_string(), "views", 1)?;
            store::add_to_set_in(
                conn,
                Collection::Users,
                &viewer.to_string(),
                "watchHistory",
                Value::String(video_id.to_string()),
            )?;
            Ok(video)
        })
    }

    /// Delete a video together with its comments and every like pointing at
    /// the video or at one of those comments.
    pub fn delete_video_cascade(&self, video_id: &Uuid) -> Result<Document, StoreError> {
        let id = video_id.to_string();
        self.with_tx(|conn| {
            let comments = store::delete_where_in(conn, Collection::Comments, &Filter::all().eq("video", id.as_str()))?;
            let comment_ids: Vec<Value> = comments
                .iter()
                .filter_map(|c| c.get("_id").cloned())
                .collect();
            delete_likes_in(conn, LikeKind::Comment, comment_ids)?;
            delete_likes_in(conn, LikeKind::Video, vec![Value::String(id.clone())])?;
            store::delete_by_id_in(conn, Collection::Videos, &id)
        })
    }

    pub fn delete_comment_cascade(&self, comment_id: &Uuid) -> Result<Document, StoreError> {
        let id = comment_id.to_string();
        self.with_tx(|conn| {
            delete_likes_in(conn, LikeKind::Comment, vec![Value::String(id.clone())])?;
            store::delete_by_id_in(conn, Collection::Comments, &id)
        })
    }

    pub fn delete_tweet_cascade(&self, tweet_id: &Uuid) -> Result<Document, StoreError> {
        let id = tweet_id.to_string();
        self.with_tx(|conn| {
            delete_likes_in(conn, LikeKind::Tweet, vec![Value::String(id.clone())])?;
            store::delete_by_id_in(conn, Collection::Tweets, &id)
        })
    }

    // -- Dashboard --

    pub fn channel_stats(&self, owner: &Uuid) -> Result<ChannelStats, StoreError> {
        let owner = owner.to_string();
        self.with_conn(|conn| {
            let (videos, views): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(json_extract(doc, '$.views')), 0)
                 FROM videos WHERE json_extract(doc, '$.owner') = ?1",
                [&owner],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let likes: i64 = conn.query_row(
                "SELECT COUNT(*) FROM likes
                 WHERE json_extract(doc, '$.target.kind') = 'video'
                   AND json_extract(doc, '$.target.id') IN (
                       SELECT id FROM videos WHERE json_extract(doc, '$.owner') = ?1
                   )",
                [&owner],
                |row| row.get(0),
            )?;

            let subscribers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE json_extract(doc, '$.channel') = ?1",
                [&owner],
                |row| row.get(0),
            )?;

            Ok(ChannelStats {
                total_videos_count: videos as u64,
                total_video_likes_count: likes as u64,
                total_subscribers_count: subscribers as u64,
                total_views: views as u64,
            })
        })
    }
}

fn subscription_key(subscriber: &Uuid, channel: &Uuid) -> Filter {
    Filter::all()
        .eq("subscriber", subscriber.to_string())
        .eq("channel", channel.to_string())
}

fn delete_likes_in(conn: &Connection, kind: LikeKind, target_ids: Vec<Value>) -> Result<(), StoreError> {
    if target_ids.is_empty() {
        return Ok(());
    }
    let filter = Filter::all()
        .eq("target.kind", kind.as_str())
        .any_of("target.id", target_ids);
    store::delete_where_in(conn, Collection::Likes, &filter)?;
    Ok(())
}
