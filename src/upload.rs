//! 音频上传处理器：流式写入暂存文件并交给存储后端。

use axum::Error as AxumError;
use axum::body::Body as AxumBody;
use axum::extract::{Extension, Query};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json as JsonResponse;
use futures_util::stream::StreamExt;
use http_body_util::BodyExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::assets::{Asset, AssetDirectory};
use crate::config::{AppConfig, STAGING_DIR};
use crate::error::ApiError;
use crate::staging::StagedFile;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug)]
pub struct UploadConfig {
    pub max_size: u64,
    pub staging_dir: PathBuf,
    pub staging_ttl: Duration,
}

impl UploadConfig {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_size: config.upload_max_size,
            staging_dir: config.storage_dir.join(STAGING_DIR),
            staging_ttl: config.staging_ttl,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct UploadQuery {
    name: Option<String>,
}

/// Last path segment of the client-supplied name, trimmed.
fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Declared audio type, or the type guessed from the name when the client
/// sent none or a generic one.
fn resolve_audio_type(headers: &HeaderMap, name: &str) -> Option<String> {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .filter(|value| !value.is_empty());

    match declared.as_deref() {
        Some(value) if value.starts_with("audio/") => Some(value.to_string()),
        Some(value) if value != OCTET_STREAM => None,
        _ => mime_guess::from_path(name)
            .iter()
            .find(|guess| guess.type_().as_str() == "audio")
            .map(|guess| guess.essence_str().to_string()),
    }
}

/// 上传单个音频文件（请求体为原始字节）。
pub async fn upload_file(
    Query(UploadQuery { name }): Query<UploadQuery>,
    headers: HeaderMap,
    Extension(directory): Extension<Arc<AssetDirectory>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    body: AxumBody,
) -> Result<(StatusCode, JsonResponse<Asset>), ApiError> {
    let name = name
        .as_deref()
        .and_then(normalize_name)
        .ok_or_else(|| ApiError::BadRequest("name is required".into()))?;
    let content_type = resolve_audio_type(&headers, &name)
        .ok_or_else(|| ApiError::BadRequest("only audio files are accepted".into()))?;

    let declared_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared_length.is_some_and(|length| length > upload.max_size) {
        return Err(ApiError::PayloadTooLarge);
    }

    let mut staged = StagedFile::create(&upload.staging_dir)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let mut data_stream = BodyExt::into_data_stream(body);
    while let Some(chunk) = data_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let err: AxumError = err;
                staged.cleanup().await;
                return Err(ApiError::BadRequest(format!("upload interrupted: {err}")));
            }
        };
        if chunk.is_empty() {
            continue;
        }
        if staged.written() + chunk.len() as u64 > upload.max_size {
            staged.cleanup().await;
            return Err(ApiError::PayloadTooLarge);
        }
        if let Err(err) = staged.write_chunk(&chunk).await {
            staged.cleanup().await;
            return Err(ApiError::Internal(err.to_string()));
        }
    }
    if staged.written() == 0 {
        staged.cleanup().await;
        return Err(ApiError::BadRequest("file is empty".into()));
    }

    let staged = staged
        .finish()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    debug!(%name, bytes = staged.size(), "upload staged");

    let asset = directory
        .create(staged, &name, &content_type)
        .await
        .map_err(|err| ApiError::from(err).upstream_context("Failed to upload file"))?;
    info!(
        file_key = %asset.file_key,
        name = %asset.file_name,
        size = asset.file_size,
        "upload complete"
    );
    Ok((StatusCode::CREATED, JsonResponse(asset)))
}
