use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored entities. Field names are camelCase with a Mongo-style `_id`, so the
/// JSON written to the document store is also the JSON returned to clients.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub avatar_public_id: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub cover_image_public_id: Option<String>,
    /// Ordered, duplicate-free list of watched video IDs.
    #[serde(default)]
    pub watch_history: Vec<Uuid>,
    pub password: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub video_file_public_id: String,
    pub thumbnail: String,
    pub thumbnail_public_id: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    #[serde(default = "default_published")]
    pub is_published: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub video: Uuid,
    pub owner: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// What a like points at. Exactly one target per like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeKind {
    Video,
    Comment,
    Tweet,
}

impl LikeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Comment => "comment",
            Self::Tweet => "tweet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeTarget {
    pub kind: LikeKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub target: LikeTarget,
    pub liked_by: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub subscriber: Uuid,
    pub channel: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner: Uuid,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner: Uuid,
    #[serde(default)]
    pub videos: Vec<Uuid>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 timestamps (microseconds, `Z` suffix).
///
/// Stored timestamps are compared as text by the store when sorting, so every
/// value must have the same width.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn now() -> String {
        format(&Utc::now())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_serializes_with_tagged_target() {
        let now = Utc::now();
        let like = Like {
            id: Uuid::new_v4(),
            target: LikeTarget { kind: LikeKind::Tweet, id: Uuid::nil() },
            liked_by: Uuid::nil(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&like).unwrap();
        assert_eq!(value["target"]["kind"], "tweet");
        assert_eq!(value["target"]["id"], Uuid::nil().to_string());
        assert!(value.get("likedBy").is_some());
        assert!(value.get("_id").is_some());
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let a = timestamp::format(&DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z").unwrap().with_timezone(&Utc));
        let b = timestamp::format(&DateTime::parse_from_rfc3339("2024-01-01T00:00:01.5Z").unwrap().with_timezone(&Utc));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
