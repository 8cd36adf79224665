pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod error;
pub mod healthcheck;
pub mod likes;
pub mod media;
pub mod middleware;
pub mod playlists;
pub mod reply;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
