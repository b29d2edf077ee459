// src/downloader/mod.rs

mod job;
mod task_runner;

pub use job::{FileTask, Outcome, build_tasks, is_downloaded, process_one};
pub use task_runner::execute_tasks;

use crate::{symbols, ui};
use colored::*;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 单次运行的汇总计数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counter {
    pub downloads: usize,
    pub conversions: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 并发任务间共享的统计管理器。所有可变访问都在互斥区内。
#[derive(Clone, Default)]
pub struct MirrorStats {
    counter: Arc<Mutex<Counter>>,
    failures: Arc<Mutex<Vec<(String, String)>>>,
}

impl MirrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_batch(&self, total: usize) {
        info!("开始新一批下载任务，总数: {}", total);
        *self.counter.lock().unwrap() = Counter::default();
        self.failures.lock().unwrap().clear();
    }

    pub fn record_download(&self) {
        self.counter.lock().unwrap().downloads += 1;
    }

    pub fn record_conversion(&self) {
        self.counter.lock().unwrap().conversions += 1;
    }

    pub fn record_skip(&self, name: &str) {
        info!("跳过文件 '{}': 本地已是最新", name);
        self.counter.lock().unwrap().skipped += 1;
    }

    pub fn record_failure(&self, name: &str, reason: &str) {
        log::error!("文件 '{}' 处理失败: {}", name, reason);
        self.counter.lock().unwrap().failed += 1;
        self.failures
            .lock()
            .unwrap()
            .push((name.to_string(), reason.to_string()));
    }

    pub fn snapshot(&self) -> Counter {
        *self.counter.lock().unwrap()
    }

    pub fn print_report(&self) {
        let counter = self.snapshot();
        let failures = self.failures.lock().unwrap();
        info!(
            "运行报告: Downloads={}, Conversions={}, Skipped={}, Failed={}",
            counter.downloads, counter.conversions, counter.skipped, counter.failed
        );

        if !failures.is_empty() {
            ui::print_sub_header("失败详情");
            let mut grouped: HashMap<&String, Vec<&String>> = HashMap::new();
            for (name, reason) in failures.iter() {
                grouped.entry(reason).or_default().push(name);
            }
            let mut reasons: Vec<_> = grouped.keys().collect();
            reasons.sort();
            for reason in reasons {
                println!("  - {}", format!("原因: {}", reason).red());
                let mut names = grouped[*reason].clone();
                names.sort();
                for name in names {
                    println!("    - {}", name);
                }
            }
        }

        ui::print_sub_header("任务总结");
        println!(
            "{} | {} | {} | {}",
            format!("下载: {}", counter.downloads).green(),
            format!("转换: {}", counter.conversions).green(),
            format!("跳过: {}", counter.skipped).cyan(),
            format!("失败: {}", counter.failed).red()
        );
        if counter.failed == 0 {
            println!("{} 所有任务均已完成。", *symbols::OK);
        }
    }
}
