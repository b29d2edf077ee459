// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const SESSION_DIR_NAME: &str = "session";

/// 每个产品目录下清单文件的名称
pub const CATALOG_FILE_NAME: &str = "inventory.json";
/// 旧版本使用的隐藏清单文件名，加载时作为回退路径
pub const CATALOG_FILE_NAME_LEGACY: &str = ".inventory.json";

pub const DEFAULT_SAVE_DIR: &str = "mirror";
pub const DEFAULT_REMOTE_ROOT: &str = "ftp://archive.example.cn/pub/products";
pub const DEFAULT_CONVERT_COMMAND: &str = "h4toh5";
pub const DEFAULT_CONVERT_EXT: &str = ".h5";

/// 远程日期目录的命名格式，如 2020_06_12
pub const REMOTE_DATE_FORMAT: &str = "%Y_%m_%d";

pub const MAX_CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_BACKOFF_SECS: u64 = 5;
/// 单个文件的最大传输尝试次数 (第二次尝试前会刷新远程状态)
pub const MAX_TRANSFER_ATTEMPTS: u32 = 2;

/// 请求范围的"无界"哨兵年份：命中时不对超出已知范围的请求发出警告
pub const UNBOUNDED_START_YEAR: i32 = 0;
pub const UNBOUNDED_STOP_YEAR: i32 = 9999;
