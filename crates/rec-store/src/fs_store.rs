//! One JSON file per (classifier, user): `<root>/<classifier>/model_<user>.json`.
//!
//! Saves go to a uniquely named temp file in the destination directory, are fsynced, then
//! renamed over the final path. Readers therefore see either the previous complete file or the
//! new one, and a crash mid-write leaves the previous file untouched.

use async_trait::async_trait;
use rec_types::{ModelBlob, ModelKey, ModelStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const MODEL_EXTENSION: &str = "json";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    classifier: &'a str,
    user_id: &'a str,
    saved_at: String,
    model: &'a ModelBlob,
}

#[derive(Deserialize)]
struct Envelope {
    classifier: String,
    user_id: String,
    #[allow(dead_code)]
    saved_at: String,
    model: ModelBlob,
}

pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_path(&self, key: &ModelKey) -> PathBuf {
        self.root
            .join(key.classifier())
            .join(format!("{}.{}", key.file_stem(), MODEL_EXTENSION))
    }

    fn temp_path(final_path: &Path) -> PathBuf {
        let name = final_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        final_path.with_file_name(format!(
            ".{}.tmp.{}.{}",
            name,
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn write_and_sync(tmp: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut f = tokio::fs::File::create(tmp).await.map_err(io_err(tmp))?;
    f.write_all(bytes).await.map_err(io_err(tmp))?;
    f.sync_all().await.map_err(io_err(tmp))?;
    Ok(())
}

#[async_trait]
impl ModelStore for FsModelStore {
    async fn load(&self, key: &ModelKey) -> Result<Option<ModelBlob>, StoreError> {
        let path = self.model_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no model found");
                return Ok(None);
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        let envelope: Envelope =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if envelope.classifier != key.classifier() || envelope.user_id != key.user_id() {
            return Err(StoreError::Corrupt {
                path: path.display().to_string(),
                reason: format!(
                    "file belongs to {}/{}",
                    envelope.classifier, envelope.user_id
                ),
            });
        }
        tracing::debug!(path = %path.display(), "model found");
        Ok(Some(envelope.model))
    }

    async fn save(&self, key: &ModelKey, blob: &ModelBlob) -> Result<(), StoreError> {
        let path = self.model_path(key);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(io_err(&parent))?;

        let bytes = serde_json::to_vec(&EnvelopeRef {
            classifier: key.classifier(),
            user_id: key.user_id(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            model: blob,
        })
        .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let tmp = Self::temp_path(&path);
        if let Err(e) = write_and_sync(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(&path)(e));
        }
        // Persist the rename itself; not every platform lets a directory be opened for this.
        if let Ok(dir) = tokio::fs::File::open(&parent).await {
            let _ = dir.sync_all().await;
        }
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "model saved");
        Ok(())
    }
}
