// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod config;
pub mod connection;
pub mod constants;
pub mod convert;
pub mod daterange;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod remote;
pub mod session;
pub mod symbols;
pub mod sync;
pub mod ui;

use crate::{
    catalog::Catalog,
    cli::{Cli, ResumeMode},
    config::AppConfig,
    convert::{CommandConverter, Converter},
    downloader::MirrorStats,
    error::{AppError, AppResult},
    remote::{LocalArchive, RemoteArchive},
    session::{DecisionProvider, FixedDecider, PromptDecider, SessionStore},
    sync::SyncEngine,
};
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info, warn};
use std::{
    path::Path,
    sync::{Arc, Mutex, atomic::AtomicBool},
};
use url::Url;

/// 核心的执行上下文，包含所有任务所需的共享状态。
///
/// 清单是唯一被多个工作单元共同修改的结构，始终通过同一把
/// 互斥锁访问。
#[derive(Clone)]
pub struct MirrorContext {
    pub config: Arc<AppConfig>,
    pub archive: Arc<dyn RemoteArchive>,
    pub catalog: Arc<Mutex<Catalog>>,
    pub converter: Option<Arc<dyn Converter>>,
    pub stats: MirrorStats,
    pub session: Option<Arc<SessionStore>>,
    pub update: bool,
    pub cancellation_token: Arc<AtomicBool>,
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);

    if args.show_catalog {
        return show_catalog(&args);
    }

    let Some(start) = args.start else {
        return Err(AppError::UserInputError(
            "必须提供起始日期 (yyyy / yyyymm / yyyymmdd)。".to_string(),
        ));
    };
    let range = daterange::parse_range(start, args.stop)?;
    info!("请求范围: {} ~ {}", range.0, range.1);

    std::fs::create_dir_all(&args.output)?;

    let password = resolve_password(&args)?;
    let archive = build_archive(&config.remote_root, args.user.as_deref(), &password)?;

    let session_store = Arc::new(SessionStore::for_product(&args.product)?);
    let decider: Box<dyn DecisionProvider> = match args.resume {
        ResumeMode::Ask => Box::new(PromptDecider),
        ResumeMode::Yes => Box::new(FixedDecider(true)),
        ResumeMode::No => Box::new(FixedDecider(false)),
    };

    run_mirror(MirrorRun {
        archive,
        config,
        product: args.product.clone(),
        local_root: args.output.clone(),
        range,
        convert: args.convert,
        resync: args.resync,
        update: args.update,
        session: Some((session_store, decider)),
        cancellation_token,
    })
    .await
}

/// 一次镜像运行的全部输入。`archive` 由调用方注入，
/// 嵌入方可在此替换自己的传输协议客户端与转换器。
pub struct MirrorRun {
    pub archive: Arc<dyn RemoteArchive>,
    pub config: Arc<AppConfig>,
    pub product: String,
    pub local_root: std::path::PathBuf,
    pub range: (NaiveDate, NaiveDate),
    pub convert: bool,
    pub resync: bool,
    pub update: bool,
    pub session: Option<(Arc<SessionStore>, Box<dyn DecisionProvider>)>,
    pub cancellation_token: Arc<AtomicBool>,
}

/// 同步 + 下载的完整流程。连接/产品级错误中止运行；
/// 清单在成功与失败两条路径上都会持久化。
pub async fn run_mirror(run: MirrorRun) -> AppResult<()> {
    let mut catalog =
        Catalog::load_or_init(&run.config.remote_root, &run.local_root, &run.product)?;

    if catalog.mark_moved(&run.local_root) {
        warn!(
            "本地根目录已移动，清单路径已修正为 {:?}",
            catalog.metadata.local.root
        );
        ui::warn("检测到本地根目录移动，已修正清单中的路径。");
    }
    let save_path = Catalog::storage_path(&catalog.metadata.local.root, &run.product);

    connection::establish(run.archive.as_ref(), &run.config).await?;
    connection::verify_product(run.archive.as_ref(), &run.product).await?;

    ui::print_header(&format!("同步产品 '{}' 的远程清单", run.product));
    let engine = SyncEngine::new(run.archive.as_ref(), run.product.clone());
    let sync_result = engine.refresh(&mut catalog, run.range, run.resync).await;
    // 扫描中途失败也要保住已取得的状态
    catalog.save_if_dirty(&save_path)?;
    let report = sync_result?;
    info!("同步完成: 新扫描 {} 个日期目录", report.scanned_dates);

    let converter: Option<Arc<dyn Converter>> = if run.convert {
        Some(Arc::new(CommandConverter::new(
            run.config.convert_command.clone(),
            run.config.convert_extension.clone(),
        )))
    } else {
        None
    };

    let target_ext = converter.as_ref().map(|c| c.target_extension().to_string());
    let mut tasks = downloader::build_tasks(&catalog, run.range, target_ext.as_deref());

    let session_store = run.session.as_ref().map(|(store, _)| store.clone());
    if let Some((store, decider)) = &run.session {
        tasks = store.filter_resumable(tasks, decider.as_ref());
        store.begin(&run.product, &tasks)?;
    }

    let stats = MirrorStats::new();
    stats.start_batch(tasks.len());

    let context = MirrorContext {
        config: run.config.clone(),
        archive: run.archive.clone(),
        catalog: Arc::new(Mutex::new(catalog)),
        converter,
        stats: stats.clone(),
        session: session_store,
        update: run.update,
        cancellation_token: run.cancellation_token.clone(),
    };

    let run_result = downloader::execute_tasks(&context, &tasks).await;

    // 成败两条路径都要持久化清单
    {
        let mut catalog = context.catalog.lock().unwrap();
        catalog.save_if_dirty(&save_path)?;
    }
    stats.print_report();

    run_result?;
    if let Some((store, _)) = &run.session {
        store.finish();
    }
    Ok(())
}

/// 不访问网络，仅展示本地清单的统计信息
fn show_catalog(args: &Cli) -> AppResult<()> {
    let path = Catalog::storage_path(&args.output, &args.product);
    if !path.is_file() {
        return Err(AppError::UserInputError(format!(
            "产品 '{}' 尚无本地清单 ({})。",
            args.product,
            path.display()
        )));
    }
    let catalog = Catalog::load(&path)?;
    let db = &catalog.metadata.database;

    ui::print_header(&format!("产品 '{}' 的本地清单", args.product));
    ui::info(&format!("远程路径: {}", catalog.metadata.server.productpath));
    ui::info(&format!("本地路径: {:?}", catalog.metadata.local.path));
    if catalog.is_empty() {
        ui::warn("清单为空，尚未同步过任何日期。");
        return Ok(());
    }
    ui::info(&format!("已知范围: {} ~ {}", db.start, db.stop));
    ui::info(&format!(
        "日期 {} 个, 文件 {} 个 ({}), 无数据日期 {} 个",
        db.dates, catalog.metadata.file.count, catalog.metadata.file.ext, db.missing
    ));
    if !catalog.gaps.is_empty() {
        let gaps: Vec<NaiveDate> = catalog.gaps.iter().copied().collect();
        let detail = sync::collapse_ranges(&gaps)
            .iter()
            .map(|(a, b)| {
                if a == b {
                    a.to_string()
                } else {
                    format!("{} ~ {}", a, b)
                }
            })
            .join(", ");
        ui::plain(&format!("    缺口: {}", detail));
    }
    Ok(())
}

fn resolve_password(args: &Cli) -> AppResult<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if args.user.is_some() {
        return Ok(ui::prompt_hidden("请输入远程档案密码")?);
    }
    Ok(String::new())
}

/// 按远程根地址构造档案会话。
///
/// 本 crate 自带文件系统后端 (`file://` 或裸路径，适用于挂载的
/// 档案副本)；其他协议由嵌入方通过 [`run_mirror`] 注入。
fn build_archive(
    remote_root: &str,
    user: Option<&str>,
    _password: &str,
) -> AppResult<Arc<dyn RemoteArchive>> {
    let user = user.unwrap_or("anonymous");
    if let Ok(url) = Url::parse(remote_root) {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| AppError::UserInputError(format!("无效的 file:// 地址: {}", remote_root)))?;
            return Ok(Arc::new(LocalArchive::new(path, user)));
        }
        if url.scheme().len() > 1 {
            return Err(AppError::UserInputError(format!(
                "协议 '{}' 需要嵌入方提供传输客户端 (通过库接口注入)。",
                url.scheme()
            )));
        }
    }
    // 裸路径视为挂载到本机的档案根
    Ok(Arc::new(LocalArchive::new(Path::new(remote_root), user)))
}
