// src/catalog.rs

use crate::constants;
use crate::error::{AppError, AppResult};
use crate::remote::{EntryStat, join_remote};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 单个远程文件的状态记录。`size == 0` 表示墓碑：
/// 文件已从远程删除，但条目保留以避免反复尝试下载。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    pub mtime: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub count: u64,
    pub ext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMeta {
    pub product: String,
    pub root: String,
    pub productpath: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMeta {
    pub root: PathBuf,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMeta {
    pub dates: u64,
    pub missing: u64,
    pub start: NaiveDate,
    pub stop: NaiveDate,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub file: FileMeta,
    pub server: ServerMeta,
    pub local: LocalMeta,
    pub database: DatabaseMeta,
}

/// 产品清单：远程档案中已知文件的持久化记录。
///
/// `dates` 与 `gaps` 使用 BTree 容器保证遍历顺序确定。
/// `temp` 仅在强制重扫期间暂存既有的转换后大小，不参与持久化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub metadata: Metadata,
    pub dates: BTreeMap<NaiveDate, BTreeMap<String, FileStat>>,
    pub gaps: BTreeSet<NaiveDate>,
    #[serde(skip)]
    pub temp: HashMap<String, u64>,
    #[serde(skip)]
    saved_at: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn new_empty(remote_root: &str, local_root: &Path, product: &str) -> Self {
        let now = Utc::now();
        // 一开始就存解析后的绝对路径，避免首次运行被误判为目录移动
        let local_root =
            dunce::canonicalize(local_root).unwrap_or_else(|_| local_root.to_path_buf());
        Self {
            metadata: Metadata {
                file: FileMeta {
                    count: 0,
                    ext: String::new(),
                },
                server: ServerMeta {
                    product: product.to_string(),
                    root: remote_root.to_string(),
                    productpath: join_remote(remote_root, product),
                },
                local: LocalMeta {
                    root: local_root.clone(),
                    path: local_root.join(product),
                },
                database: DatabaseMeta {
                    dates: 0,
                    missing: 0,
                    start: NaiveDate::MAX,
                    stop: NaiveDate::MIN,
                    created: now,
                    updated: now,
                },
            },
            dates: BTreeMap::new(),
            gaps: BTreeSet::new(),
            temp: HashMap::new(),
            saved_at: None,
        }
    }

    /// 清单文件在产品目录下的路径
    pub fn storage_path(local_root: &Path, product: &str) -> PathBuf {
        local_root.join(product).join(constants::CATALOG_FILE_NAME)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::CorruptCatalog(format!("{}: {}", path.display(), e)))?;
        let mut catalog: Catalog = serde_json::from_str(&content)
            .map_err(|e| AppError::CorruptCatalog(format!("{}: {}", path.display(), e)))?;
        catalog.saved_at = Some(catalog.metadata.database.updated);
        debug!(
            "已加载清单 {} (日期 {} 个, 缺口 {} 个)",
            path.display(),
            catalog.dates.len(),
            catalog.gaps.len()
        );
        Ok(catalog)
    }

    /// 加载既有清单，不存在时创建空清单。旧版隐藏文件名作为回退。
    pub fn load_or_init(
        remote_root: &str,
        local_root: &Path,
        product: &str,
    ) -> AppResult<Self> {
        let path = Self::storage_path(local_root, product);
        if path.is_file() {
            return Self::load(&path);
        }
        let legacy = local_root
            .join(product)
            .join(constants::CATALOG_FILE_NAME_LEGACY);
        if legacy.is_file() {
            info!("使用旧版清单文件 {}", legacy.display());
            return Self::load(&legacy);
        }
        info!("产品 '{}' 尚无本地清单，将新建。", product);
        Ok(Self::new_empty(remote_root, local_root, product))
    }

    /// 原子写入：先写临时文件再重命名，崩溃时不会留下半写的清单
    pub fn save(&mut self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("无法创建清单目录 '{}'", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
        fs::write(tmp.path(), json)?;
        tmp.persist(path)?;
        self.saved_at = Some(self.metadata.database.updated);
        debug!("清单已写入 {}", path.display());
        Ok(())
    }

    /// 仅当 `updated` 自上次保存后推进过才写盘
    pub fn save_if_dirty(&mut self, path: &Path) -> AppResult<bool> {
        if self.is_dirty() {
            self.save(path)?;
            Ok(true)
        } else {
            debug!("清单未变更，跳过写盘");
            Ok(false)
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self.saved_at {
            Some(t) => self.metadata.database.updated > t,
            None => true,
        }
    }

    pub fn is_dirty_since(&self, t: DateTime<Utc>) -> bool {
        self.metadata.database.updated > t
    }

    /// 推进 `updated`。连续多次变更落在同一系统时间刻度内时
    /// 仍保证严格递增。
    pub fn touch(&mut self) {
        let next = self.metadata.database.updated + Duration::microseconds(1);
        self.metadata.database.updated = Utc::now().max(next);
    }

    /// 本地根目录移动检测：以解析后的绝对路径比较，不一致时修正
    /// 存储的根路径与派生的产品路径。不触发重扫。
    pub fn mark_moved(&mut self, current_root: &Path) -> bool {
        let resolved =
            dunce::canonicalize(current_root).unwrap_or_else(|_| current_root.to_path_buf());
        if resolved == self.metadata.local.root {
            return false;
        }
        self.metadata.local.root = resolved.clone();
        self.metadata.local.path = resolved.join(&self.metadata.server.product);
        self.touch();
        true
    }

    /// 将一次日期目录扫描的结果并入清单。
    /// 重扫期间 `temp` 中暂存的转换后大小按文件名恢复。
    pub fn insert_scan(&mut self, date: NaiveDate, entries: &[EntryStat]) {
        let record = self.dates.entry(date).or_default();
        for entry in entries {
            let converted = self.temp.get(&entry.name).copied();
            let stat = record.entry(entry.name.clone()).or_insert(FileStat {
                size: 0,
                mtime: entry.mtime,
                converted: None,
            });
            stat.size = entry.size;
            stat.mtime = entry.mtime;
            if stat.converted.is_none() {
                stat.converted = converted;
            }
            if self.metadata.file.ext.is_empty() {
                if let Some((_, ext)) = entry.name.rsplit_once('.') {
                    self.metadata.file.ext = format!(".{}", ext);
                }
            }
        }
        self.gaps.remove(&date);
        self.touch();
    }

    /// 刷新单个文件的权威远程状态；`None` 表示远程已删除，打墓碑。
    pub fn refresh_stat(&mut self, date: NaiveDate, name: &str, stat: Option<&EntryStat>) {
        let record = self.dates.entry(date).or_default();
        match stat {
            Some(s) => {
                let entry = record.entry(name.to_string()).or_insert(FileStat {
                    size: 0,
                    mtime: s.mtime,
                    converted: None,
                });
                entry.size = s.size;
                entry.mtime = s.mtime;
            }
            None => {
                if let Some(entry) = record.get_mut(name) {
                    entry.size = 0;
                    entry.converted = None;
                }
            }
        }
        self.touch();
    }

    /// 记录转换产物的实际大小
    pub fn set_converted(&mut self, date: NaiveDate, name: &str, size: Option<u64>) {
        if let Some(entry) = self.dates.get_mut(&date).and_then(|r| r.get_mut(name)) {
            entry.converted = size;
            self.touch();
        }
    }

    /// 强制重扫前的清场：既有转换后大小按文件名暂存到 `temp`，
    /// 日期、缺口与派生计数全部清空。
    pub fn begin_resync(&mut self) {
        for record in self.dates.values() {
            for (name, stat) in record {
                if let Some(size) = stat.converted {
                    self.temp.insert(name.clone(), size);
                }
            }
        }
        self.dates.clear();
        self.gaps.clear();
        self.metadata.file.count = 0;
        self.metadata.database.dates = 0;
        self.metadata.database.missing = 0;
        self.metadata.database.start = NaiveDate::MAX;
        self.metadata.database.stop = NaiveDate::MIN;
        self.touch();
    }

    /// 扫描结束后丢弃暂存
    pub fn end_sync(&mut self) {
        self.temp.clear();
    }

    /// 以 `dates` 的键重算已知范围与计数
    pub fn recompute_envelope(&mut self) {
        match (self.dates.keys().next(), self.dates.keys().next_back()) {
            (Some(&first), Some(&last)) => {
                self.metadata.database.start = first;
                self.metadata.database.stop = last;
            }
            _ => {
                self.metadata.database.start = NaiveDate::MAX;
                self.metadata.database.stop = NaiveDate::MIN;
            }
        }
        self.metadata.database.dates = self.dates.len() as u64;
        self.metadata.file.count = self
            .dates
            .values()
            .map(|r| r.values().filter(|s| s.size > 0).count() as u64)
            .sum();
    }

    /// 缺口重算：已知范围内没有数据的日期并入 `gaps`，
    /// 并保证 `gaps` 与 `dates` 的键不相交。
    pub fn recompute_gaps(&mut self) {
        let (start, stop) = (self.metadata.database.start, self.metadata.database.stop);
        if start > stop {
            self.gaps.clear();
            self.metadata.database.missing = 0;
            return;
        }
        let mut day = start;
        while day <= stop {
            if !self.dates.contains_key(&day) {
                self.gaps.insert(day);
            }
            day = day.succ_opt().expect("date overflow");
        }
        self.gaps.retain(|d| !self.dates.contains_key(d));
        self.metadata.database.missing = self.gaps.len() as u64;
    }

    /// 范围是否为空哨兵状态
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
