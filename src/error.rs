// src/error.rs

use crate::remote::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("无法建立远程连接 (已重试 {attempts} 次): {reason}")]
    Connection { attempts: u32, reason: String },
    #[error("远程认证失败 (用户名或密码错误)")]
    AuthFailed,
    #[error("远程档案中不存在产品 '{0}'")]
    InvalidProduct(String),
    #[error("清单文件损坏或缺少必要字段: {0}")]
    CorruptCatalog(String),
    #[error("无效的日期格式 '{0}' (应为 yyyy、yyyymm 或 yyyymmdd)")]
    InvalidDateFormat(i64),
    #[error("远程操作失败: {0}")]
    Remote(#[from] RemoteError),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("格式转换失败: {0}")]
    Conversion(String),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
