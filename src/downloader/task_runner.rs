// src/downloader/task_runner.rs

use super::job::{FileTask, Outcome, process_one};
use crate::MirrorContext;
use crate::error::{AppError, AppResult};
use crate::ui;
use futures::{StreamExt, stream};
use indicatif::ProgressBar;
use log::error;
use std::cmp::min;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// 并发执行一批下载任务。
///
/// 任务列表在进入工作池前一次性生成；清单与计数器的每次变更
/// 都在各自的互斥区内完成，完成顺序不影响最终清单状态。
pub async fn execute_tasks(context: &MirrorContext, tasks: &[FileTask]) -> AppResult<()> {
    let max_workers = min(context.config.max_workers, tasks.len());
    if max_workers == 0 {
        return Ok(());
    }

    ui::plain("");
    ui::info(&format!(
        "开始处理 {} 个文件 (并发数: {})...",
        tasks.len(),
        max_workers
    ));
    let main_pbar = ui::new_tasks_progress_bar(tasks.len() as u64, "下载");

    let fatal = Arc::new(tokio::sync::Mutex::new(None::<AppError>));

    stream::iter(tasks.to_owned())
        .for_each_concurrent(max_workers, |task| {
            run_single_concurrent_task(task, context.clone(), main_pbar.clone(), fatal.clone())
        })
        .await;

    main_pbar.finish_and_clear();
    if context.cancellation_token.load(Ordering::Relaxed) {
        return Err(AppError::UserInterrupt);
    }
    if let Some(err) = fatal.lock().await.take() {
        return Err(err);
    }
    Ok(())
}

/// 在并发池中运行的单个任务单元
async fn run_single_concurrent_task(
    task: FileTask,
    context: MirrorContext,
    main_pbar: ProgressBar,
    fatal: Arc<tokio::sync::Mutex<Option<AppError>>>,
) {
    if context.cancellation_token.load(Ordering::Relaxed) || fatal.lock().await.is_some() {
        return;
    }

    match process_one(&context, &task).await {
        Ok(outcome) => {
            match &outcome {
                Outcome::Downloaded => context.stats.record_download(),
                Outcome::Converted => context.stats.record_conversion(),
                Outcome::Skipped => context.stats.record_skip(&task.name),
                Outcome::Failed(reason) => {
                    context.stats.record_failure(&task.name, reason);
                    main_pbar.println(format!(
                        "{} {} 失败: {}",
                        *crate::symbols::ERROR,
                        task.name,
                        reason
                    ));
                }
            }
            if let (Some(session), false) =
                (&context.session, matches!(outcome, Outcome::Failed(_)))
            {
                if let Err(e) = session.mark_done(&task.remote) {
                    log::warn!("会话记录写入失败: {}", e);
                }
            }
            main_pbar.inc(1);
        }
        Err(e) => {
            // 连接/认证级错误中止整个批次
            let mut lock = fatal.lock().await;
            if lock.is_none() {
                error!("任务 '{}' 遭遇致命错误，将中止整个批次: {}", task.name, e);
                context.stats.record_failure(&task.name, &e.to_string());
                *lock = Some(e);
            }
        }
    }
}
