use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

/// Each collection is `(id, doc)`; the unique indexes below are what keep
/// likes, subscriptions, playlist names and user handles unique under
/// concurrent writers.
pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial collections)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX idx_users_username
                ON users(json_extract(doc, '$.username'));
            CREATE UNIQUE INDEX idx_users_email
                ON users(json_extract(doc, '$.email'));

            CREATE TABLE videos (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE INDEX idx_videos_owner
                ON videos(json_extract(doc, '$.owner'));

            CREATE TABLE comments (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE INDEX idx_comments_video
                ON comments(json_extract(doc, '$.video'), json_extract(doc, '$.createdAt'));

            CREATE TABLE likes (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX idx_likes_target_user
                ON likes(
                    json_extract(doc, '$.target.kind'),
                    json_extract(doc, '$.target.id'),
                    json_extract(doc, '$.likedBy')
                );
            CREATE INDEX idx_likes_user
                ON likes(json_extract(doc, '$.likedBy'));

            CREATE TABLE subscriptions (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX idx_subscriptions_pair
                ON subscriptions(json_extract(doc, '$.subscriber'), json_extract(doc, '$.channel'));
            CREATE INDEX idx_subscriptions_channel
                ON subscriptions(json_extract(doc, '$.channel'));

            CREATE TABLE tweets (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE INDEX idx_tweets_owner
                ON tweets(json_extract(doc, '$.owner'));

            CREATE TABLE playlists (
                id      TEXT PRIMARY KEY,
                doc     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX idx_playlists_owner_name
                ON playlists(json_extract(doc, '$.owner'), json_extract(doc, '$.name'));

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
