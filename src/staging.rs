//! 上传暂存文件：先写入暂存目录，再交给存储后端。

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// 正在写入的暂存文件。
pub struct StagedFile {
    path: PathBuf,
    file: File,
    written: u64,
}

impl StagedFile {
    /// 在暂存目录中创建新的临时文件。
    pub async fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.part", Uuid::new_v4()));
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// 放弃并清理暂存文件。
    pub async fn cleanup(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.path).await;
    }

    /// 刷盘并关闭，返回可交给后端的上传。
    pub async fn finish(self) -> io::Result<StagedUpload> {
        if let Err(err) = self.file.sync_all().await {
            let _ = fs::remove_file(&self.path).await;
            return Err(err);
        }
        drop(self.file);
        Ok(StagedUpload {
            path: self.path,
            size: self.written,
        })
    }
}

/// 已完整写入的暂存上传。
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    size: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Moves the staged bytes to `target`; the staging file is gone either way.
    pub async fn persist(self, target: &Path) -> io::Result<()> {
        if let Err(err) = fs::rename(&self.path, target).await {
            let _ = fs::remove_file(&self.path).await;
            return Err(err);
        }
        if let Some(parent) = target.parent() {
            let _ = sync_dir(parent).await;
        }
        Ok(())
    }

    pub async fn discard(self) {
        let _ = fs::remove_file(&self.path).await;
    }
}

async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

/// 清理过期的暂存文件。
pub async fn cleanup_stale_staging(dir: &Path, ttl: Duration) -> io::Result<()> {
    if ttl.is_zero() || fs::metadata(dir).await.is_err() {
        return Ok(());
    }

    let now = SystemTime::now();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };
        if age >= ttl {
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => info!(path = ?path, "removed stale staging file"),
                Err(err) => warn!(path = ?path, error = %err, "failed to remove stale staging file"),
            }
        }
    }

    Ok(())
}
