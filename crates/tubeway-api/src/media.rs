//! Media storage for avatars, cover images, thumbnails and video files.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored file: where clients fetch it and the handle used to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid media id '{0}'")]
    InvalidId(String),

    #[error("empty upload")]
    Empty,
}

pub trait MediaStore: Send + Sync {
    fn upload<'a>(&'a self, bytes: Bytes, file_name: &'a str, kind: MediaKind) -> BoxFuture<'a, Result<MediaAsset, MediaError>>;

    /// `false` when nothing was stored under `public_id`.
    fn delete<'a>(&'a self, public_id: &'a str, kind: MediaKind) -> BoxFuture<'a, Result<bool, MediaError>>;
}

/// Files under `{root}/{kind}/`, served by the server at `{public_url}/media`.
pub struct DiskMediaStore {
    root: PathBuf,
    public_url: String,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Map a public id back to a path, refusing anything outside `kind`'s
    /// directory.
    fn locate(&self, public_id: &str, kind: MediaKind) -> Result<PathBuf, MediaError> {
        let file = public_id
            .strip_prefix(kind.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|file| !file.is_empty() && !file.contains(['/', '\\']) && !file.starts_with('.'))
            .ok_or_else(|| MediaError::InvalidId(public_id.to_string()))?;
        Ok(self.root.join(kind.as_str()).join(file))
    }
}

impl MediaStore for DiskMediaStore {
    fn upload<'a>(&'a self, bytes: Bytes, file_name: &'a str, kind: MediaKind) -> BoxFuture<'a, Result<MediaAsset, MediaError>> {
        Box::pin(async move {
            if bytes.is_empty() {
                return Err(MediaError::Empty);
            }

            let dir = self.root.join(kind.as_str());
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                error!("Failed to create media directory {}: {}", dir.display(), e);
                e
            })?;

            let file = format!("{}{}", Uuid::new_v4(), extension_of(file_name));
            let path = dir.join(&file);
            let mut out = tokio::fs::File::create(&path).await.map_err(|e| {
                error!("Failed to create file {}: {}", path.display(), e);
                e
            })?;
            out.write_all(&bytes).await?;
            out.flush().await?;

            debug!("Stored {} bytes at {}", bytes.len(), path.display());
            Ok(MediaAsset {
                url: format!("{}/media/{}/{}", self.public_url, kind, file),
                public_id: format!("{}/{}", kind, file),
            })
        })
    }

    fn delete<'a>(&'a self, public_id: &'a str, kind: MediaKind) -> BoxFuture<'a, Result<bool, MediaError>> {
        Box::pin(async move {
            let path = self.locate(public_id, kind)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Lowercased `.ext` of an uploaded file name, or nothing when it has none
/// or it is not plain alphanumerics.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

// -- Multipart forms --

pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A multipart body split into text fields and file parts.
#[derive(Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Malformed form data: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Malformed form data: {}", e)))?;

            match file_name {
                Some(file_name) if !bytes.is_empty() => {
                    form.files.insert(name, Upload { file_name, bytes });
                }
                Some(_) => {}
                None => {
                    form.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

pub async fn store_upload(media: &dyn MediaStore, upload: Upload, kind: MediaKind) -> Result<MediaAsset, ApiError> {
    Ok(media.upload(upload.bytes, &upload.file_name, kind).await?)
}

/// Best-effort removal of a replaced or orphaned file.
pub async fn discard(media: &dyn MediaStore, public_id: &str, kind: MediaKind) {
    match media.delete(public_id, kind).await {
        Ok(true) => debug!("Deleted {} {}", kind, public_id),
        Ok(false) => debug!("{} {} was already gone", kind, public_id),
        Err(e) => error!("Failed to delete {} {}: {}", kind, public_id, e),
    }
}

/// Pass `result` through, deleting the freshly stored `assets` when it failed.
pub async fn discard_on_error<T>(
    media: &dyn MediaStore,
    assets: &[(&str, MediaKind)],
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    if result.is_err() {
        for (public_id, kind) in assets {
            discard(media, public_id, *kind).await;
        }
    }
    result
}
