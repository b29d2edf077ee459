// src/remote/local.rs

use super::{EntryStat, RemoteArchive, RemoteError, remote_basename};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 以本地目录为后端的档案实现。
///
/// 用于挂载到本机的档案副本 (NFS 等)，也是集成测试的主要后端。
/// 凭据在此实现中不参与校验，仅在连接日志中使用。
pub struct LocalArchive {
    root: PathBuf,
    user: String,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>, user: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            user: user.into(),
        }
    }

    fn resolve(&self, remote_path: &str) -> PathBuf {
        let mut p = self.root.clone();
        for seg in remote_path.split('/').filter(|s| !s.is_empty()) {
            p.push(seg);
        }
        p
    }

    fn map_io(err: std::io::Error, path: &str) -> RemoteError {
        match err.kind() {
            ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
            _ => RemoteError::Transfer(format!("{}: {}", path, err)),
        }
    }
}

#[async_trait]
impl RemoteArchive for LocalArchive {
    async fn connect(&self) -> Result<(), RemoteError> {
        log::debug!("以用户 '{}' 连接本地档案 {:?}", self.user, self.root);
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(RemoteError::ConnectionLost(format!(
                "档案根 {:?} 不是目录",
                self.root
            ))),
            Err(e) => Err(RemoteError::ConnectionLost(format!(
                "档案根 {:?} 不可访问: {}",
                self.root, e
            ))),
        }
    }

    async fn change_directory(&self, path: &str) -> Result<(), RemoteError> {
        let dir = self.resolve(path);
        let meta = fs::metadata(&dir).await.map_err(|e| Self::map_io(e, path))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(RemoteError::NotFound(path.to_string()))
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let dir = self.resolve(path);
        let mut rd = fs::read_dir(&dir).await.map_err(|e| Self::map_io(e, path))?;
        let mut names = Vec::new();
        while let Some(entry) = rd.next_entry().await.map_err(|e| Self::map_io(e, path))? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn stat_scan(&self, path: &str) -> Result<Vec<EntryStat>, RemoteError> {
        let dir = self.resolve(path);
        let mut rd = fs::read_dir(&dir).await.map_err(|e| Self::map_io(e, path))?;
        let mut stats = Vec::new();
        while let Some(entry) = rd.next_entry().await.map_err(|e| Self::map_io(e, path))? {
            let meta = entry.metadata().await.map_err(|e| Self::map_io(e, path))?;
            if !meta.is_file() {
                continue;
            }
            stats.push(EntryStat {
                name: entry.file_name().to_string_lossy().to_string(),
                size: meta.len(),
                mtime: system_time_to_utc(meta.modified().ok()),
            });
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }

    async fn stat(&self, path: &str) -> Result<EntryStat, RemoteError> {
        let file = self.resolve(path);
        let meta = fs::metadata(&file).await.map_err(|e| Self::map_io(e, path))?;
        if !meta.is_file() {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        Ok(EntryStat {
            name: remote_basename(path).to_string(),
            size: meta.len(),
            mtime: system_time_to_utc(meta.modified().ok()),
        })
    }

    async fn download(&self, remote_path: &str, local_dir: &Path) -> Result<(), RemoteError> {
        let src = self.resolve(remote_path);
        let dst = local_dir.join(remote_basename(remote_path));
        fs::create_dir_all(local_dir)
            .await
            .map_err(|e| RemoteError::Transfer(format!("{:?}: {}", local_dir, e)))?;
        fs::copy(&src, &dst)
            .await
            .map_err(|e| Self::map_io(e, remote_path))?;
        Ok(())
    }
}

fn system_time_to_utc(t: Option<std::time::SystemTime>) -> DateTime<Utc> {
    t.map(DateTime::<Utc>::from).unwrap_or_else(Utc::now)
}
