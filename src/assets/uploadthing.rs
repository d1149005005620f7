//! UploadThing REST client (v6 API).

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::{Asset, STATUS_UPLOADED, StoreError, StoredObject};
use crate::config::{LIST_PAGE_LIMIT, UPLOADTHING_FILE_URL_BASE, UploadthingSettings};
use crate::staging::StagedUpload;

const API_KEY_HEADER: &str = "x-uploadthing-api-key";
const UPLOAD_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Serialize)]
struct ListFilesRequest {
    limit: u32,
}

#[derive(Deserialize)]
struct ListFilesResponse {
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    uploaded_at: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesRequest<'a> {
    file_keys: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesResponse {
    success: bool,
    #[serde(default)]
    deleted_count: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadFilesRequest<'a> {
    files: [FileDescriptor<'a>; 1],
    acl: &'static str,
    content_disposition: &'static str,
}

#[derive(Serialize)]
struct FileDescriptor<'a> {
    name: &'a str,
    size: u64,
    #[serde(rename = "type")]
    content_type: &'a str,
}

#[derive(Deserialize)]
struct UploadFilesResponse {
    data: Vec<PresignedUpload>,
}

#[derive(Deserialize)]
struct PresignedUpload {
    key: String,
    url: String,
    #[serde(default)]
    fields: HashMap<String, String>,
}

impl RemoteFile {
    fn into_stored(self) -> StoredObject {
        StoredObject {
            key: self.key,
            name: self.name,
            size: self.size,
            status: self.status,
            uploaded_at: DateTime::from_timestamp_millis(self.uploaded_at).unwrap_or_default(),
        }
    }
}

/// Thin adapter over the provider's file API.
pub struct UploadthingClient {
    http: Client,
    api_url: String,
    secret: String,
    timeout: Duration,
}

impl UploadthingClient {
    pub fn new(settings: &UploadthingSettings, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            api_url: settings.api_url.clone(),
            secret: settings.secret.clone(),
            timeout,
        })
    }

    pub fn file_url_base(&self) -> &str {
        UPLOADTHING_FILE_URL_BASE
    }

    async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        body: &T,
    ) -> Result<R, StoreError> {
        let response = self
            .http
            .post(format!("{}{route}", self.api_url))
            .header(API_KEY_HEADER, &self.secret)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Provider(format!("{route} returned {status}: {text}")));
        }
        Ok(response.json::<R>().await?)
    }

    pub async fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
        let response: ListFilesResponse = self
            .call("/v6/listFiles", &ListFilesRequest {
                limit: LIST_PAGE_LIMIT,
            })
            .await?;
        debug!(count = response.files.len(), "listed provider files");
        Ok(response
            .files
            .into_iter()
            .map(RemoteFile::into_stored)
            .collect())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response: DeleteFilesResponse = self
            .call("/v6/deleteFiles", &DeleteFilesRequest { file_keys: [key] })
            .await?;
        if !response.success {
            return Err(StoreError::Provider(format!("delete of {key} was not accepted")));
        }
        info!(key, deleted = ?response.deleted_count, "deleted provider file");
        Ok(())
    }

    /// Requests a presigned upload, then sends the staged bytes to it.
    pub async fn create(
        &self,
        upload: StagedUpload,
        name: &str,
        content_type: &str,
    ) -> Result<Asset, StoreError> {
        let result = self.upload_staged(&upload, name, content_type).await;
        upload.discard().await;
        result
    }

    async fn upload_staged(
        &self,
        upload: &StagedUpload,
        name: &str,
        content_type: &str,
    ) -> Result<Asset, StoreError> {
        let size = upload.size();
        let presigned: UploadFilesResponse = self
            .call("/v6/uploadFiles", &UploadFilesRequest {
                files: [FileDescriptor {
                    name,
                    size,
                    content_type,
                }],
                acl: "public-read",
                content_disposition: "inline",
            })
            .await?;
        let target = presigned
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Provider("no presigned upload returned".into()))?;

        let file = File::open(upload.path()).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));
        let request = if target.fields.is_empty() {
            self.http
                .put(&target.url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header(reqwest::header::CONTENT_LENGTH, size)
                .body(body)
        } else {
            let mut form = Form::new();
            for (field, value) in target.fields {
                form = form.text(field, value);
            }
            let part = Part::stream_with_length(body, size)
                .file_name(name.to_string())
                .mime_str(content_type)?;
            self.http.post(&target.url).multipart(form.part("file", part))
        };

        let response = request.timeout(UPLOAD_TRANSFER_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(key = %target.key, %status, "presigned upload rejected");
            return Err(StoreError::Provider(format!("upload returned {status}: {text}")));
        }

        info!(key = %target.key, name, size, "uploaded file to provider");
        Ok(StoredObject {
            key: target.key,
            name: Some(name.to_string()),
            size,
            status: STATUS_UPLOADED.to_string(),
            uploaded_at: Utc::now(),
        }
        .into_asset(self.file_url_base()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_response_maps_to_objects() {
        let body = r#"{
            "hasMore": false,
            "files": [
                {"id": "1", "key": "abc", "name": "song.mp3", "size": 1024,
                 "status": "Uploaded", "uploadedAt": 1700000000000},
                {"id": "2", "key": "def", "name": null, "size": 3,
                 "status": "Failed", "uploadedAt": 1700000001000}
            ]
        }"#;
        let response: ListFilesResponse = serde_json::from_str(body).expect("parse");
        let objects: Vec<StoredObject> = response
            .files
            .into_iter()
            .map(RemoteFile::into_stored)
            .collect();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "abc");
        assert_eq!(objects[0].uploaded_at.timestamp(), 1_700_000_000);
        assert!(objects[1].name.is_none());

        let listing = crate::assets::build_listing(objects, UPLOADTHING_FILE_URL_BASE);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].file_url, "https://utfs.io/f/abc");
    }

    #[test]
    fn request_bodies_match_provider_shape() {
        let delete = serde_json::to_value(DeleteFilesRequest { file_keys: ["abc"] })
            .expect("serialize");
        assert_eq!(delete, serde_json::json!({ "fileKeys": ["abc"] }));

        let upload = serde_json::to_value(UploadFilesRequest {
            files: [FileDescriptor {
                name: "a.mp3",
                size: 3,
                content_type: "audio/mpeg",
            }],
            acl: "public-read",
            content_disposition: "inline",
        })
        .expect("serialize");
        assert_eq!(upload["files"][0]["type"], "audio/mpeg");
        assert_eq!(upload["contentDisposition"], "inline");
    }
}
