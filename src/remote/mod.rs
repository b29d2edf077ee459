// src/remote/mod.rs

mod local;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use local::LocalArchive;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryArchive;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

/// 远程档案操作的错误分类。连接类错误会触发重连或中止整个运行，
/// 其余错误按单个操作处理。
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("远程路径不存在: {0}")]
    NotFound(String),
    #[error("远程访问被拒绝: {0}")]
    PermissionDenied(String),
    #[error("连接已断开: {0}")]
    ConnectionLost(String),
    #[error("认证失败")]
    AuthFailed,
    #[error("传输错误: {0}")]
    Transfer(String),
}

impl RemoteError {
    /// 是否为可通过重试/重连恢复的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionLost(_) | RemoteError::Transfer(_)
        )
    }
}

/// 远程文件的状态记录，由 `stat_scan` 返回
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub name: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

/// 远程档案会话的统一接口。
///
/// 具体的传输协议 (FTP 等) 由实现方负责；引擎只依赖这组操作。
/// 远程路径统一使用 '/' 分隔的相对路径字符串。
#[async_trait]
pub trait RemoteArchive: Send + Sync {
    /// 建立会话。重复调用应是幂等的，断线重连也走这里。
    async fn connect(&self) -> Result<(), RemoteError>;

    /// 切换到指定目录，用于验证路径存在与可访问
    async fn change_directory(&self, path: &str) -> Result<(), RemoteError>;

    /// 列出目录下的条目名称 (不含路径前缀)
    async fn list(&self, path: &str) -> Result<Vec<String>, RemoteError>;

    /// 扫描目录下所有文件的大小与修改时间
    async fn stat_scan(&self, path: &str) -> Result<Vec<EntryStat>, RemoteError>;

    /// 获取单个文件的状态；文件不存在时返回 `NotFound`
    async fn stat(&self, path: &str) -> Result<EntryStat, RemoteError>;

    /// 将远程文件下载到本地目录，保持原文件名
    async fn download(&self, remote_path: &str, local_dir: &Path) -> Result<(), RemoteError>;
}

/// 拼接远程路径段，统一使用 '/' 分隔
pub fn join_remote(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), segment)
    }
}

/// 取远程路径的最后一段文件名
pub fn remote_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
