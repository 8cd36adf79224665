use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, comments, dashboard, healthcheck, likes, playlists, subscriptions, tweets, users, videos};

/// Video uploads go through multipart bodies.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Every API route, mounted under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthcheck", get(healthcheck::healthcheck))
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/refresh-token", post(auth::refresh_token));

    let protected_routes = Router::new()
        // users
        .route("/users/logout", post(auth::logout))
        .route("/users/current-user", get(users::current_user))
        .route("/users/c/{username}", get(users::channel_profile))
        .route("/users/history", get(users::watch_history))
        // videos
        .route("/videos", get(videos::list_videos).post(videos::publish_video))
        .route(
            "/videos/{video_id}",
            get(videos::get_video).patch(videos::update_video).delete(videos::delete_video),
        )
        .route("/videos/toggle/publish/{video_id}", patch(videos::toggle_publish))
        // comments
        .route(
            "/comments/{video_id}",
            get(comments::get_video_comments).post(comments::add_comment),
        )
        .route(
            "/comments/c/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // likes
        .route("/likes/toggle/v/{video_id}", post(likes::toggle_video_like))
        .route("/likes/toggle/c/{comment_id}", post(likes::toggle_comment_like))
        .route("/likes/toggle/t/{tweet_id}", post(likes::toggle_tweet_like))
        .route("/likes/videos", get(likes::liked_videos))
        // subscriptions
        .route(
            "/subscriptions/c/{channel_id}",
            get(subscriptions::channel_subscribers).post(subscriptions::toggle_subscription),
        )
        .route("/subscriptions/u/{subscriber_id}", get(subscriptions::subscribed_channels))
        // playlists
        .route("/playlist", post(playlists::create_playlist))
        .route("/playlist/user/{user_id}", get(playlists::user_playlists))
        .route(
            "/playlist/{playlist_id}",
            get(playlists::get_playlist)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route("/playlist/add/{video_id}/{playlist_id}", patch(playlists::add_video))
        .route("/playlist/remove/{video_id}/{playlist_id}", patch(playlists::remove_video))
        // tweets
        .route("/tweets", get(tweets::current_user_tweets).post(tweets::create_tweet))
        .route("/tweets/user/{user_id}", get(tweets::user_tweets))
        .route("/tweets/{tweet_id}", patch(tweets::update_tweet).delete(tweets::delete_tweet))
        // dashboard
        .route("/dashboard/stats", get(dashboard::channel_stats))
        .route("/dashboard/videos", get(dashboard::own_videos))
        .route("/dashboard/videos/channel/{channel_id}", get(dashboard::channel_videos))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}
