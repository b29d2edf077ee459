// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use sat_dl::{cli::Cli, logging, run_from_cli};
use std::{
    env,
    sync::{Arc, atomic::AtomicBool, atomic::Ordering},
    time::Duration,
};

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let cancellation_token = Arc::new(AtomicBool::new(false));
    let token_for_signal = cancellation_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        token_for_signal.store(true, Ordering::Relaxed);
        println!("\n{} 用户强制中断程序。", "[!]".yellow());
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::process::exit(130);
    });

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "sat-dl".to_string());

    let after_help = format!(
        "示例:\n  # 镜像 2020 年 6 月的数据\n  {bin} -p MOD021KM -u user 202006\n\n  # 镜像一个日期区间并转换为 H5\n  {bin} -p MOD021KM -u user 20200601 20200630 --convert\n\n  # 强制全量重扫\n  {bin} -p MOD021KM -u user 2020 --resync\n\n  # 查看本地清单\n  {bin} -p MOD021KM --show-catalog",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = Arc::new(Cli::from_arg_matches(&cmd.get_matches()).unwrap());

    logging::setup_logging(args.log_level, args.log_file.as_deref());

    if let Err(e) = run_from_cli(args, cancellation_token).await {
        eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
        std::process::exit(1);
    }
}
