//! 文件列表与删除处理器。

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json, Path};
use axum::response::Json as JsonResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::assets::{Asset, AssetDirectory};
use crate::auth::SuccessBody;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteByUrlRequest {
    file_url: Option<String>,
}

/// 列出已上传的文件。
pub async fn list_files(
    Extension(directory): Extension<Arc<AssetDirectory>>,
) -> Result<JsonResponse<Vec<Asset>>, ApiError> {
    let assets = directory
        .list()
        .await
        .map_err(|err| ApiError::from(err).upstream_context("Failed to fetch files"))?;
    info!(count = assets.len(), "list files");
    Ok(JsonResponse(assets))
}

/// 按文件 key 删除。
pub async fn delete_file(
    Extension(directory): Extension<Arc<AssetDirectory>>,
    Path(file_key): Path<String>,
) -> Result<JsonResponse<SuccessBody>, ApiError> {
    delete_key(&directory, &file_key).await
}

/// 按文件 URL 删除：去掉后端的 URL 前缀得到 key。
pub async fn delete_by_url(
    Extension(directory): Extension<Arc<AssetDirectory>>,
    payload: Result<Json<DeleteByUrlRequest>, JsonRejection>,
) -> Result<JsonResponse<SuccessBody>, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::BadRequest("No file key provided".into()))?;
    let file_url = payload.file_url.unwrap_or_default();
    let file_key = file_url
        .strip_prefix(directory.file_url_base())
        .unwrap_or(&file_url);
    delete_key(&directory, file_key).await
}

async fn delete_key(
    directory: &AssetDirectory,
    file_key: &str,
) -> Result<JsonResponse<SuccessBody>, ApiError> {
    let file_key = file_key.trim();
    if file_key.is_empty() {
        return Err(ApiError::BadRequest("File key is required".into()));
    }
    directory
        .delete(file_key)
        .await
        .map_err(|err| ApiError::from(err).upstream_context("Failed to delete file"))?;
    info!(file_key, "delete file");
    Ok(JsonResponse(SuccessBody { success: true }))
}
