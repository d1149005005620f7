use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Asset, STATUS_UPLOADED, StoreError, StoredObject};
use crate::config::{LOCAL_FILE_URL_BASE, STAGING_DIR};
use crate::staging::StagedUpload;

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";

/// Sidecar metadata stored next to every local object.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    size: u64,
    uploaded_at_ms: i64,
}

/// Asset storage in a local directory: `objects/<key>` plus `meta/<key>.json`.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.objects_dir()).await?;
        fs::create_dir_all(self.meta_dir()).await?;
        fs::create_dir_all(self.staging_dir()).await
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    fn meta_dir(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn file_url_base(&self) -> &str {
        LOCAL_FILE_URL_BASE
    }

    /// Resolves a key to its object and metadata paths, rejecting anything
    /// that is not a single plain file name.
    async fn resolve_key(&self, key: &str) -> Result<(PathBuf, PathBuf), StoreError> {
        let mut components = Path::new(key).components();
        let segment = match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) => segment,
            _ => return Err(StoreError::InvalidKey),
        };
        let segment = segment.to_str().ok_or(StoreError::InvalidKey)?;
        if segment.starts_with('.') || segment.contains('\\') {
            return Err(StoreError::InvalidKey);
        }

        let object = self.objects_dir().join(segment);
        match fs::symlink_metadata(&object).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(StoreError::InvalidKey);
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }
        Ok((object, self.meta_dir().join(format!("{segment}.json"))))
    }

    pub async fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
        let mut dir = match fs::read_dir(self.meta_dir()).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(key) = file_name.strip_suffix(".json") else {
                continue;
            };
            let meta: ObjectMeta = match fs::read(entry.path())
                .await
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(key, error = %err, "skipping unreadable object metadata");
                    continue;
                }
            };
            if fs::metadata(self.objects_dir().join(key)).await.is_err() {
                warn!(key, "skipping metadata without object file");
                continue;
            }
            objects.push(StoredObject {
                key: key.to_string(),
                name: Some(meta.name),
                size: meta.size,
                status: STATUS_UPLOADED.to_string(),
                uploaded_at: DateTime::from_timestamp_millis(meta.uploaded_at_ms)
                    .unwrap_or_default(),
            });
        }
        Ok(objects)
    }

    pub async fn create(
        &self,
        upload: StagedUpload,
        name: &str,
        content_type: &str,
    ) -> Result<Asset, StoreError> {
        if let Err(err) = self.ensure_root().await {
            upload.discard().await;
            return Err(err.into());
        }
        let key = new_key(name);
        let (object_path, meta_path) = match self.resolve_key(&key).await {
            Ok(paths) => paths,
            Err(err) => {
                upload.discard().await;
                return Err(err);
            }
        };
        let uploaded_at = Utc::now();
        let meta = ObjectMeta {
            name: name.to_string(),
            size: upload.size(),
            uploaded_at_ms: uploaded_at.timestamp_millis(),
        };

        upload.persist(&object_path).await?;
        let meta_bytes = serde_json::to_vec(&meta)?;
        let meta_temp = self.meta_dir().join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        let written = async {
            fs::write(&meta_temp, meta_bytes).await?;
            fs::rename(&meta_temp, &meta_path).await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&meta_temp).await;
            let _ = fs::remove_file(&object_path).await;
            return Err(err.into());
        }

        info!(%key, name, content_type, size = meta.size, "stored object");
        Ok(StoredObject {
            key,
            name: Some(meta.name),
            size: meta.size,
            status: STATUS_UPLOADED.to_string(),
            uploaded_at,
        }
        .into_asset(self.file_url_base()))
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let (object_path, meta_path) = self.resolve_key(key).await?;
        for path in [object_path, meta_path] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Random key keeping the (sanitised) extension of the uploaded name.
fn new_key(name: &str) -> String {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{extension}", Uuid::new_v4().simple())
}
