// src/cli.rs

use crate::constants;
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// 中断会话的恢复策略
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResumeMode {
    /// 交互询问是否恢复
    Ask,
    /// 总是恢复上次未完成的会话
    Yes,
    /// 总是丢弃上次未完成的会话
    No,
}

#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
pub struct Cli {
    /// 要镜像的产品名称 (远程档案下的顶层目录)
    #[arg(short, long, help_heading = "Mode")]
    pub product: String,
    /// 起始日期 (yyyy / yyyymm / yyyymmdd)
    #[arg(value_name = "START", help_heading = "Mode")]
    pub start: Option<i64>,
    /// 结束日期，缺省时与起始日期相同
    #[arg(value_name = "STOP", help_heading = "Mode")]
    pub stop: Option<i64>,
    /// 只显示本地清单的统计信息，不访问远程档案
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub show_catalog: bool,

    // --- 下载选项 (Options) ---
    /// 远程档案的登录用户名
    #[arg(short, long, help_heading = "Options")]
    pub user: Option<String>,
    /// 远程档案的登录密码，未提供时将安全提示输入
    #[arg(long, help_heading = "Options")]
    pub password: Option<String>,
    /// 远程档案根地址 (如 ftp://host/pub/products)
    #[arg(long, value_name = "URI", help_heading = "Options")]
    pub remote_root: Option<String>,
    /// 本地镜像根目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Options")]
    pub output: PathBuf,
    /// 下载后将文件转换为目标格式 (外部转换器)
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub convert: bool,
    /// 强制重新核对全部远程日期目录，忽略增量假设
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub resync: bool,
    /// 远程文件比本地新时重新下载
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub update: bool,
    /// 设置最大并发下载数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub workers: Option<usize>,
    /// 检测到未完成会话时的处理方式
    #[arg(long, value_enum, default_value_t = ResumeMode::Ask, help_heading = "Options")]
    pub resume: ResumeMode,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// 设置日志文件的输出级别
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, help_heading = "General")]
    pub log_level: LogLevel,
    /// 日志文件路径，缺省时写入用户配置目录
    #[arg(long, value_name = "FILE", global = true, help_heading = "General")]
    pub log_file: Option<PathBuf>,
}
