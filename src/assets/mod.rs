//! Asset directory: listing, creating and deleting uploaded files on a
//! storage backend.
//!
//! Two backends exist: a local directory (default, also used by the tests)
//! and the UploadThing REST API. Both feed their raw object listings through
//! the same inclusion policy so the UI sees one format.

mod local;
mod uploadthing;

pub use local::LocalStore;
pub use uploadthing::UploadthingClient;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, Backend};
use crate::staging::StagedUpload;

/// 对外展示的文件条目。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub file_key: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub uploaded_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid file key")]
    InvalidKey,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("object metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// A backend object before the inclusion policy is applied.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    pub name: Option<String>,
    pub size: u64,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

pub const STATUS_UPLOADED: &str = "Uploaded";

impl StoredObject {
    /// Listed when the name looks like an MP3, or the object finished uploading.
    pub fn is_listed(&self) -> bool {
        let looks_like_mp3 = self.name.as_deref().is_some_and(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".mp3") || lower.contains("mp3")
        });
        looks_like_mp3 || self.status == STATUS_UPLOADED
    }

    pub fn into_asset(self, url_base: &str) -> Asset {
        let file_name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => self.key.clone(),
        };
        Asset {
            file_url: format!("{url_base}{}", self.key),
            file_key: self.key,
            file_name,
            file_size: self.size,
            uploaded_at: format_timestamp(self.uploaded_at),
        }
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filters, formats and sorts a raw listing, newest first.
pub fn build_listing(objects: Vec<StoredObject>, url_base: &str) -> Vec<Asset> {
    let mut listed: Vec<StoredObject> = objects.into_iter().filter(StoredObject::is_listed).collect();
    listed.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    listed
        .into_iter()
        .map(|object| object.into_asset(url_base))
        .collect()
}

pub enum AssetDirectory {
    Local(LocalStore),
    Uploadthing(UploadthingClient),
}

impl AssetDirectory {
    pub fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        match (config.backend, &config.uploadthing) {
            (Backend::Uploadthing, Some(settings)) => Ok(AssetDirectory::Uploadthing(
                UploadthingClient::new(settings, config.upstream_timeout)?,
            )),
            (Backend::Uploadthing, None) => {
                Err(StoreError::Provider("uploadthing secret missing".into()))
            }
            (Backend::Local, _) => Ok(AssetDirectory::Local(LocalStore::new(
                config.storage_dir.clone(),
            ))),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            AssetDirectory::Local(_) => "local",
            AssetDirectory::Uploadthing(_) => "uploadthing",
        }
    }

    /// Prefix that turns a file key into its public URL.
    pub fn file_url_base(&self) -> &str {
        match self {
            AssetDirectory::Local(store) => store.file_url_base(),
            AssetDirectory::Uploadthing(client) => client.file_url_base(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Asset>, StoreError> {
        let objects = match self {
            AssetDirectory::Local(store) => store.list_objects().await?,
            AssetDirectory::Uploadthing(client) => client.list_objects().await?,
        };
        Ok(build_listing(objects, self.file_url_base()))
    }

    pub async fn create(
        &self,
        upload: StagedUpload,
        name: &str,
        content_type: &str,
    ) -> Result<Asset, StoreError> {
        match self {
            AssetDirectory::Local(store) => store.create(upload, name, content_type).await,
            AssetDirectory::Uploadthing(client) => client.create(upload, name, content_type).await,
        }
    }

    /// Deletes `key`; a key the backend does not know is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            AssetDirectory::Local(store) => store.delete(key).await,
            AssetDirectory::Uploadthing(client) => client.delete(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn object(key: &str, name: Option<&str>, status: &str, secs: i64) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            name: name.map(str::to_string),
            size: 42,
            status: status.to_string(),
            uploaded_at: Utc.timestamp_opt(secs, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn inclusion_policy() {
        assert!(object("a", Some("Song.MP3"), "Uploading", 0).is_listed());
        assert!(object("b", Some("mp3-rip.wav"), "Failed", 0).is_listed());
        assert!(object("c", Some("notes.txt"), STATUS_UPLOADED, 0).is_listed());
        assert!(!object("d", Some("notes.txt"), "Uploading", 0).is_listed());
        assert!(!object("e", None, "Failed", 0).is_listed());
    }

    #[test]
    fn listing_is_sorted_and_formatted() {
        let listing = build_listing(
            vec![
                object("old", Some("old.mp3"), STATUS_UPLOADED, 1_700_000_000),
                object("skip", Some("x.txt"), "Failed", 1_800_000_000),
                object("new", Some(""), STATUS_UPLOADED, 1_710_000_000),
            ],
            "https://utfs.io/f/",
        );
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].file_key, "new");
        assert_eq!(listing[0].file_name, "new");
        assert_eq!(listing[0].file_url, "https://utfs.io/f/new");
        assert_eq!(listing[1].uploaded_at, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn asset_serializes_camel_case() {
        let asset = object("k", Some("a.mp3"), STATUS_UPLOADED, 0).into_asset("/f/");
        let value = serde_json::to_value(&asset).expect("serialize");
        assert_eq!(value["fileKey"], "k");
        assert_eq!(value["fileUrl"], "/f/k");
        assert_eq!(value["fileSize"], 42);
        assert_eq!(value["uploadedAt"], "1970-01-01T00:00:00.000Z");
    }
}
