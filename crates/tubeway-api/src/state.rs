use std::sync::Arc;

use tracing::error;

use tubeway_db::Database;

use crate::auth::TokenConfig;
use crate::error::ApiError;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: Arc<dyn MediaStore>,
    pub tokens: TokenConfig,
}

/// Run blocking store work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Dependency("Background task failed".into())
        })?
}
