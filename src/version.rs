//! 版本信息接口（公开）。

use axum::extract::Extension;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::sync::Arc;

use crate::assets::AssetDirectory;
use crate::build;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    version: &'static str,
    commit: &'static str,
    build_time: &'static str,
    build_env: String,
    backend: &'static str,
}

pub async fn get_version_info(
    Extension(directory): Extension<Arc<AssetDirectory>>,
) -> JsonResponse<VersionInfo> {
    JsonResponse(VersionInfo {
        version: build::PKG_VERSION,
        commit: build::SHORT_COMMIT,
        build_time: build::BUILD_TIME,
        build_env: format!("{},{}", build::RUST_VERSION, build::RUST_CHANNEL),
        backend: directory.backend_name(),
    })
}
