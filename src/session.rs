// src/session.rs

use crate::constants;
use crate::downloader::FileTask;
use crate::error::AppResult;
use crate::ui;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// 一次运行开始前持久化的待下载列表。
/// 崩溃恢复层，叠加在清单跳过逻辑之上，不替代它。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub product: String,
    pub created: DateTime<Utc>,
    pub pending: Vec<PendingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub remote: String,
    pub local: PathBuf,
}

/// 会话恢复询问的注入点：核心逻辑不直接依赖终端。
pub trait DecisionProvider: Send + Sync {
    fn resume_previous(&self, session: &SessionFile) -> bool;
}

/// 非交互式回答，由 `--resume yes|no` 提供
pub struct FixedDecider(pub bool);

impl DecisionProvider for FixedDecider {
    fn resume_previous(&self, _session: &SessionFile) -> bool {
        self.0
    }
}

/// 交互式询问
pub struct PromptDecider;

impl DecisionProvider for PromptDecider {
    fn resume_previous(&self, session: &SessionFile) -> bool {
        ui::warn(&format!(
            "检测到产品 '{}' 的未完成会话 ({} 个待下载文件, {})。",
            session.product,
            session.pending.len(),
            session.created.format("%Y-%m-%d %H:%M:%S")
        ));
        ui::confirm("是否从上次中断处继续", true)
    }
}

/// 会话文件与完成记录的存取。完成记录按行追加，
/// 多个工作单元并发写入时由内部互斥区串行化。
pub struct SessionStore {
    path: PathBuf,
    done_path: PathBuf,
    done_lock: Mutex<()>,
}

impl SessionStore {
    /// 默认位置: `~/.sat-dl/session/<product>.json`
    pub fn for_product(product: &str) -> AppResult<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("无法获取用户主目录"))?
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::SESSION_DIR_NAME);
        Ok(Self::at(dir, product))
    }

    pub fn at(dir: PathBuf, product: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", product)),
            done_path: dir.join(format!("{}.done", product)),
            done_lock: Mutex::new(()),
        }
    }

    /// 读取上次运行遗留的会话 (若有)
    pub fn load(&self) -> Option<SessionFile> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("会话文件 {:?} 无法解析，忽略: {}", self.path, e);
                None
            }
        }
    }

    /// 在传输开始前写入本次运行的待下载列表，并清空完成记录
    pub fn begin(&self, product: &str, tasks: &[FileTask]) -> AppResult<()> {
        let session = SessionFile {
            product: product.to_string(),
            created: Utc::now(),
            pending: tasks
                .iter()
                .map(|t| PendingEntry {
                    remote: t.remote.clone(),
                    local: t.download.clone(),
                })
                .collect(),
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&session)?)?;
        let _ = fs::remove_file(&self.done_path);
        debug!("会话文件已写入 {:?} ({} 项)", self.path, session.pending.len());
        Ok(())
    }

    /// 记录一个已完成 (成功或确认跳过) 的远程路径
    pub fn mark_done(&self, remote: &str) -> AppResult<()> {
        let _guard = self.done_lock.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.done_path)?;
        writeln!(file, "{}", remote)?;
        Ok(())
    }

    /// 上次运行已完成的远程路径集合
    pub fn completed(&self) -> HashSet<String> {
        fs::read_to_string(&self.done_path)
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// 运行正常结束，清除会话痕迹
    pub fn finish(&self) {
        let _ = fs::remove_file(&self.path);
        let _ = fs::remove_file(&self.done_path);
        info!("会话文件已清除");
    }

    /// 按上次会话过滤任务列表：只保留上次待下载且尚未完成的项。
    /// 决策方选择丢弃时返回原列表。
    pub fn filter_resumable(
        &self,
        tasks: Vec<FileTask>,
        decider: &dyn DecisionProvider,
    ) -> Vec<FileTask> {
        let Some(session) = self.load() else {
            return tasks;
        };
        if session.pending.is_empty() || !decider.resume_previous(&session) {
            info!("丢弃上次未完成的会话");
            return tasks;
        }
        let done = self.completed();
        let pending: HashSet<&str> = session
            .pending
            .iter()
            .map(|p| p.remote.as_str())
            .filter(|r| !done.contains(*r))
            .collect();
        let before = tasks.len();
        let filtered: Vec<FileTask> = tasks
            .into_iter()
            .filter(|t| pending.contains(t.remote.as_str()))
            .collect();
        info!(
            "会话恢复: 任务从 {} 个缩减到 {} 个 (已完成 {} 个)",
            before,
            filtered.len(),
            done.len()
        );
        filtered
    }
}
