// src/downloader/job.rs

use crate::MirrorContext;
use crate::catalog::{Catalog, FileStat};
use crate::connection;
use crate::constants;
use crate::convert::Converter;
use crate::error::AppResult;
use crate::remote::{RemoteError, join_remote};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// 单个下载单元的路径描述，由清单、日期与文件名推导，不持久化。
#[derive(Debug, Clone)]
pub struct FileTask {
    pub name: String,
    pub date: NaiveDate,
    /// 远程全限定路径
    pub remote: String,
    /// 远程日期目录
    pub src_dir: String,
    /// 本地日期目录
    pub dst_dir: PathBuf,
    /// 原始下载产物路径
    pub download: PathBuf,
    /// 转换产物路径；未配置转换器时与 `download` 相同
    pub target: PathBuf,
}

/// 单个文件的处理结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    Converted,
    Skipped,
    Failed(String),
}

/// 展开请求范围内的全部下载单元。墓碑条目 (size == 0) 不生成任务。
/// 倒序范围产生空列表。
pub fn build_tasks(
    catalog: &Catalog,
    range: (NaiveDate, NaiveDate),
    target_ext: Option<&str>,
) -> Vec<FileTask> {
    let (start, stop) = range;
    if start > stop {
        return Vec::new();
    }
    let product = &catalog.metadata.server.product;
    let local_product = &catalog.metadata.local.path;
    let mut tasks = Vec::new();
    for (&date, record) in catalog.dates.range(start..=stop) {
        let year = date.format("%Y").to_string();
        let folder = date.format(constants::REMOTE_DATE_FORMAT).to_string();
        let src_dir = join_remote(&join_remote(product, &year), &folder);
        let dst_dir = local_product.join(&year).join(&folder);
        for (name, stat) in record {
            if stat.size == 0 {
                debug!("'{}/{}' 已打墓碑，跳过任务生成", folder, name);
                continue;
            }
            let download = dst_dir.join(name);
            let target = match target_ext {
                Some(ext) => download.with_extension(ext.trim_start_matches('.')),
                None => download.clone(),
            };
            tasks.push(FileTask {
                name: name.clone(),
                date,
                remote: join_remote(&src_dir, name),
                src_dir: src_dir.clone(),
                dst_dir: dst_dir.clone(),
                download,
                target,
            });
        }
    }
    tasks
}

/// 新鲜度检查：文件存在、大小与清单一致；`update` 开启时
/// 本地修改时间不得早于清单记录的远程修改时间。
pub fn is_downloaded(
    path: &Path,
    expected_size: u64,
    remote_mtime: DateTime<Utc>,
    update: bool,
) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() || meta.len() != expected_size {
        return false;
    }
    if update {
        let Ok(modified) = meta.modified() else {
            return false;
        };
        if DateTime::<Utc>::from(modified) < remote_mtime {
            return false;
        }
    }
    true
}

/// 任务级新鲜度：配置了转换器时检查转换产物与 `converted` 大小，
/// 否则检查原始产物与 `size`。
fn task_satisfied(task: &FileTask, stat: &FileStat, update: bool, has_converter: bool) -> bool {
    if has_converter {
        stat.converted
            .is_some_and(|c| is_downloaded(&task.target, c, stat.mtime, update))
    } else {
        is_downloaded(&task.download, stat.size, stat.mtime, update)
    }
}

fn lookup_stat(ctx: &MirrorContext, task: &FileTask) -> Option<FileStat> {
    let catalog = ctx.catalog.lock().unwrap();
    catalog
        .dates
        .get(&task.date)
        .and_then(|r| r.get(&task.name))
        .cloned()
}

async fn run_conversion(task: &FileTask, converter: &dyn Converter) -> AppResult<u64> {
    if task.target.exists() {
        std::fs::remove_file(&task.target)?;
    }
    converter.convert(&task.download, &task.target).await?;
    Ok(task.target.metadata()?.len())
}

/// 处理单个下载单元。
///
/// 两次有限尝试；第一次失败后重连并向远程取该文件的权威状态
/// 写回清单 (过期的缓存状态会导致无限重下)，远程已删除则打墓碑。
/// 只有连接/认证级错误会作为 Err 向外传播。
pub async fn process_one(ctx: &MirrorContext, task: &FileTask) -> AppResult<Outcome> {
    let Some(mut stat) = lookup_stat(ctx, task) else {
        return Ok(Outcome::Failed("清单中无此文件的记录".into()));
    };
    let has_converter = ctx.converter.is_some();

    if task_satisfied(task, &stat, ctx.update, has_converter) {
        return Ok(Outcome::Skipped);
    }

    // 运行前原始产物是否已存在，决定转换后是否允许清理
    let pre_existing = task.download.is_file();
    let mut fetched = false;
    let mut last_error = String::new();

    for attempt in 1..=constants::MAX_TRANSFER_ATTEMPTS {
        if !is_downloaded(&task.download, stat.size, stat.mtime, ctx.update) {
            match ctx.archive.download(&task.remote, &task.dst_dir).await {
                Ok(()) => {
                    fetched = true;
                    debug!("已下载 '{}'", task.remote);
                }
                Err(e) => {
                    warn!("下载 '{}' 失败 (第 {} 次): {}", task.remote, attempt, e);
                    last_error = e.to_string();
                }
            }
        }

        if let Some(converter) = &ctx.converter {
            if is_downloaded(&task.download, stat.size, stat.mtime, ctx.update) {
                let conversion_current = stat
                    .converted
                    .is_some_and(|c| task.target.metadata().is_ok_and(|m| m.len() == c));
                if !conversion_current {
                    match run_conversion(task, converter.as_ref()).await {
                        Ok(actual) => {
                            {
                                let mut catalog = ctx.catalog.lock().unwrap();
                                catalog.set_converted(task.date, &task.name, Some(actual));
                            }
                            stat.converted = Some(actual);
                            if !pre_existing && task.download != task.target {
                                if let Err(e) = std::fs::remove_file(&task.download) {
                                    debug!("清理原始产物 {:?} 失败: {}", task.download, e);
                                }
                            }
                        }
                        Err(e) => {
                            error!("转换 '{}' 失败: {}", task.name, e);
                            last_error = e.to_string();
                        }
                    }
                }
            }
        }

        if task_satisfied(task, &stat, ctx.update, has_converter) {
            return Ok(if fetched {
                Outcome::Downloaded
            } else {
                // 原始产物本就有效，本次只发生了转换
                Outcome::Converted
            });
        }

        if attempt < constants::MAX_TRANSFER_ATTEMPTS {
            connection::reconnect(ctx.archive.as_ref(), &ctx.config).await?;
            match ctx.archive.stat(&task.remote).await {
                Ok(remote_stat) => {
                    {
                        let mut catalog = ctx.catalog.lock().unwrap();
                        catalog.refresh_stat(task.date, &task.name, Some(&remote_stat));
                    }
                    debug!(
                        "已刷新 '{}' 的远程状态: size={}, mtime={}",
                        task.remote, remote_stat.size, remote_stat.mtime
                    );
                    stat.size = remote_stat.size;
                    stat.mtime = remote_stat.mtime;
                }
                Err(RemoteError::NotFound(_)) => {
                    let mut catalog = ctx.catalog.lock().unwrap();
                    catalog.refresh_stat(task.date, &task.name, None);
                    drop(catalog);
                    info!("远程文件 '{}' 已不存在，记录墓碑。", task.remote);
                    return Ok(Outcome::Failed("远程文件已被删除".into()));
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
        }
    }

    Ok(Outcome::Failed(if last_error.is_empty() {
        "下载后校验未通过".into()
    } else {
        last_error
    }))
}
