// src/remote/memory.rs

use super::{EntryStat, RemoteArchive, RemoteError, remote_basename};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

/// 内存档案实现，仅用于测试。
///
/// 目录结构由已注册文件的路径推导；连接与传输失败可按脚本注入，
/// 用于验证重试、重连与墓碑逻辑。
pub struct MemoryArchive {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, MemFile>,
    dirs: BTreeSet<String>,
    fail_connects: u32,
    auth_fail: bool,
    connect_count: u32,
    downloads: Vec<String>,
    broken: BTreeSet<String>,
}

struct MemFile {
    size: u64,
    mtime: DateTime<Utc>,
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArchive {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.dirs.insert(String::new());
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// 注册一个远程文件，并自动登记所有上级目录
    pub fn add_file(&self, path: &str, size: u64, mtime: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        let mut prefix = String::new();
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for seg in &segs[..segs.len().saturating_sub(1)] {
            prefix = if prefix.is_empty() {
                (*seg).to_string()
            } else {
                format!("{}/{}", prefix, seg)
            };
            inner.dirs.insert(prefix.clone());
        }
        inner.files.insert(path.to_string(), MemFile { size, mtime });
    }

    /// 注册一个空目录 (没有任何文件的日期目录等)
    pub fn add_dir(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        let mut prefix = String::new();
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            prefix = if prefix.is_empty() {
                seg.to_string()
            } else {
                format!("{}/{}", prefix, seg)
            };
            inner.dirs.insert(prefix.clone());
        }
    }

    pub fn remove_file(&self, path: &str) {
        self.inner.lock().unwrap().files.remove(path);
    }

    /// 令接下来 n 次 connect 以连接错误失败
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().unwrap().fail_connects = n;
    }

    pub fn set_auth_fail(&self, fail: bool) {
        self.inner.lock().unwrap().auth_fail = fail;
    }

    /// 令指定文件的下载始终失败
    pub fn break_file(&self, path: &str) {
        self.inner.lock().unwrap().broken.insert(path.to_string());
    }

    pub fn repair_file(&self, path: &str) {
        self.inner.lock().unwrap().broken.remove(path);
    }

    pub fn connect_count(&self) -> u32 {
        self.inner.lock().unwrap().connect_count
    }

    pub fn download_log(&self) -> Vec<String> {
        self.inner.lock().unwrap().downloads.clone()
    }

    fn children(inner: &Inner, path: &str) -> Option<Vec<String>> {
        let norm = path.trim_matches('/').to_string();
        if !inner.dirs.contains(&norm) {
            return None;
        }
        let prefix = if norm.is_empty() {
            String::new()
        } else {
            format!("{}/", norm)
        };
        let mut names = BTreeSet::new();
        for dir in &inner.dirs {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    names.insert(rest.to_string());
                }
            }
        }
        for file in inner.files.keys() {
            if let Some(rest) = file.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    names.insert(rest.to_string());
                }
            }
        }
        Some(names.into_iter().collect())
    }
}

#[async_trait]
impl RemoteArchive for MemoryArchive {
    async fn connect(&self) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_count += 1;
        if inner.auth_fail {
            return Err(RemoteError::AuthFailed);
        }
        if inner.fail_connects > 0 {
            inner.fail_connects -= 1;
            return Err(RemoteError::ConnectionLost("脚本注入的连接失败".into()));
        }
        Ok(())
    }

    async fn change_directory(&self, path: &str) -> Result<(), RemoteError> {
        let inner = self.inner.lock().unwrap();
        match Self::children(&inner, path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let inner = self.inner.lock().unwrap();
        Self::children(&inner, path).ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn stat_scan(&self, path: &str) -> Result<Vec<EntryStat>, RemoteError> {
        let inner = self.inner.lock().unwrap();
        let names =
            Self::children(&inner, path).ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        let norm = path.trim_matches('/');
        let mut stats = Vec::new();
        for name in names {
            let full = if norm.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", norm, name)
            };
            if let Some(f) = inner.files.get(&full) {
                stats.push(EntryStat {
                    name,
                    size: f.size,
                    mtime: f.mtime,
                });
            }
        }
        Ok(stats)
    }

    async fn stat(&self, path: &str) -> Result<EntryStat, RemoteError> {
        let inner = self.inner.lock().unwrap();
        let norm = path.trim_matches('/');
        inner
            .files
            .get(norm)
            .map(|f| EntryStat {
                name: remote_basename(norm).to_string(),
                size: f.size,
                mtime: f.mtime,
            })
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn download(&self, remote_path: &str, local_dir: &Path) -> Result<(), RemoteError> {
        let size = {
            let mut inner = self.inner.lock().unwrap();
            let norm = remote_path.trim_matches('/').to_string();
            if inner.broken.contains(&norm) {
                return Err(RemoteError::Transfer(format!("脚本注入的传输失败: {}", norm)));
            }
            let size = inner
                .files
                .get(&norm)
                .ok_or_else(|| RemoteError::NotFound(remote_path.to_string()))?
                .size;
            inner.downloads.push(norm);
            size
        };
        let dst = local_dir.join(remote_basename(remote_path));
        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| RemoteError::Transfer(e.to_string()))?;
        tokio::fs::write(&dst, vec![0u8; size as usize])
            .await
            .map_err(|e| RemoteError::Transfer(e.to_string()))?;
        Ok(())
    }
}
