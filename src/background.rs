//! 上传暂存目录清理的后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::STAGING_CLEAN_INTERVAL_SECS;
use crate::staging::cleanup_stale_staging;
use crate::upload::UploadConfig;

/// 启动后台任务（暂存文件清理）。
pub fn spawn_background_tasks(upload: Arc<UploadConfig>) {
    if upload.staging_ttl.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(STAGING_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            if let Err(err) = cleanup_stale_staging(&upload.staging_dir, upload.staging_ttl).await {
                warn!(error = %err, "staging cleanup failed");
            }
        }
    });
}
