// src/convert.rs

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use tokio::process::Command;

/// 下载产物的格式转换器。实现方可被嵌入方整体替换。
#[async_trait]
pub trait Converter: Send + Sync {
    /// 转换产物的扩展名 (如 ".h5")
    fn target_extension(&self) -> &str;

    /// 将 `input` 转换为 `output`。输出文件若已存在，
    /// 由调用方先行移除。
    async fn convert(&self, input: &Path, output: &Path) -> AppResult<()>;
}

/// 调用外部转换程序 (如 h4toh5) 的转换器
pub struct CommandConverter {
    command: String,
    extension: String,
}

impl CommandConverter {
    pub fn new(command: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            extension: extension.into(),
        }
    }
}

#[async_trait]
impl Converter for CommandConverter {
    fn target_extension(&self) -> &str {
        &self.extension
    }

    async fn convert(&self, input: &Path, output: &Path) -> AppResult<()> {
        debug!("转换 {:?} -> {:?} (命令: {})", input, output, self.command);
        let status = Command::new(&self.command)
            .arg(input)
            .arg(output)
            .status()
            .await
            .map_err(|e| AppError::Conversion(format!("无法启动 '{}': {}", self.command, e)))?;
        if !status.success() {
            return Err(AppError::Conversion(format!(
                "'{}' 退出码 {:?} (输入: {:?})",
                self.command,
                status.code(),
                input
            )));
        }
        if !output.is_file() {
            return Err(AppError::Conversion(format!(
                "转换程序未产生输出文件 {:?}",
                output
            )));
        }
        Ok(())
    }
}

/// 直接复制字节的转换器，仅用于测试
#[cfg(any(test, feature = "testing"))]
pub struct CopyConverter {
    extension: String,
}

#[cfg(any(test, feature = "testing"))]
impl CopyConverter {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl Converter for CopyConverter {
    fn target_extension(&self) -> &str {
        &self.extension
    }

    async fn convert(&self, input: &Path, output: &Path) -> AppResult<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}
