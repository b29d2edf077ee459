// src/config.rs

use crate::{cli::Cli, constants, error::AppResult};
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_attempts: Option<u32>,
    pub backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConverterConfig {
    /// 外部转换程序，按 `<command> <输入> <输出>` 方式调用
    pub command: Option<String>,
    pub extension: Option<String>,
}

/// 持久化在用户目录下的外部配置文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_root: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        Self {
            remote_root: Some(constants::DEFAULT_REMOTE_ROOT.to_string()),
            network: NetworkConfig {
                connect_attempts: Some(constants::MAX_CONNECT_ATTEMPTS),
                backoff_secs: Some(constants::CONNECT_BACKOFF_SECS),
            },
            converter: ConverterConfig {
                command: Some(constants::DEFAULT_CONVERT_COMMAND.to_string()),
                extension: Some(constants::DEFAULT_CONVERT_EXT.to_string()),
            },
        }
    }
}

pub(crate) fn get_config_path() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("无法获取用户主目录"))?
        .join(constants::CONFIG_DIR_NAME)
        .join(constants::CONFIG_FILE_NAME);
    Ok(path)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_path()?;
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))
            .map_err(crate::error::AppError::from)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json_content = serde_json::to_string_pretty(&config)?;
        fs::write(&config_path, json_content)?;

        Ok(config)
    }
}

/// 运行期配置：外部配置文件与命令行参数合并后的结果
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub remote_root: String,
    pub max_workers: usize,
    pub connect_attempts: u32,
    pub backoff: Duration,
    pub convert_command: String,
    pub convert_extension: String,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external = load_or_create_external_config()?;
        Ok(Self::merge(args, external))
    }

    fn merge(args: &Cli, external: ExternalConfig) -> Self {
        Self {
            remote_root: args
                .remote_root
                .clone()
                .or(external.remote_root)
                .unwrap_or_else(|| constants::DEFAULT_REMOTE_ROOT.to_string()),
            max_workers: args.workers.unwrap_or(4),
            connect_attempts: external
                .network
                .connect_attempts
                .unwrap_or(constants::MAX_CONNECT_ATTEMPTS),
            backoff: Duration::from_secs(
                external
                    .network
                    .backoff_secs
                    .unwrap_or(constants::CONNECT_BACKOFF_SECS),
            ),
            convert_command: external
                .converter
                .command
                .unwrap_or_else(|| constants::DEFAULT_CONVERT_COMMAND.to_string()),
            convert_extension: external
                .converter
                .extension
                .unwrap_or_else(|| constants::DEFAULT_CONVERT_EXT.to_string()),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote_root: "ftp://test.host/pub".to_string(),
            max_workers: 4,
            connect_attempts: 5,
            backoff: Duration::from_millis(10),
            convert_command: "copy".to_string(),
            convert_extension: ".h5".to_string(),
        }
    }
}
