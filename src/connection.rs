// src/connection.rs

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::remote::{RemoteArchive, RemoteError};
use log::{debug, info, warn};
use tokio::time::sleep;

/// 按固定退避建立远程会话。
///
/// 瞬时错误在有限次数内重试；认证失败立即放弃；
/// 重试耗尽后返回致命的连接错误，整个运行中止。
pub async fn establish(archive: &dyn RemoteArchive, config: &AppConfig) -> AppResult<()> {
    let mut last_reason = String::new();
    for attempt in 1..=config.connect_attempts {
        match archive.connect().await {
            Ok(()) => {
                debug!("远程会话已建立 (第 {} 次尝试)", attempt);
                return Ok(());
            }
            Err(RemoteError::AuthFailed) => return Err(AppError::AuthFailed),
            Err(e) if e.is_transient() => {
                warn!(
                    "连接失败 (第 {}/{} 次): {}",
                    attempt, config.connect_attempts, e
                );
                last_reason = e.to_string();
                if attempt < config.connect_attempts {
                    sleep(config.backoff).await;
                }
            }
            Err(e) => return Err(AppError::Remote(e)),
        }
    }
    Err(AppError::Connection {
        attempts: config.connect_attempts,
        reason: last_reason,
    })
}

/// 断线后的重连，退避策略与初次连接一致
pub async fn reconnect(archive: &dyn RemoteArchive, config: &AppConfig) -> AppResult<()> {
    info!("尝试重建远程会话...");
    establish(archive, config).await
}

/// 验证远程根目录与产品目录。
///
/// 根目录因权限无法验证时仅告警并按假定路径继续；
/// 产品目录不存在则始终致命。
pub async fn verify_product(archive: &dyn RemoteArchive, product: &str) -> AppResult<()> {
    match archive.change_directory("").await {
        Ok(()) => {}
        Err(RemoteError::PermissionDenied(path)) => {
            warn!("远程根目录 '{}' 权限不足，无法验证，按假定路径继续。", path);
        }
        Err(e) => return Err(AppError::Remote(e)),
    }
    match archive.change_directory(product).await {
        Ok(()) => Ok(()),
        Err(RemoteError::NotFound(_)) => Err(AppError::InvalidProduct(product.to_string())),
        Err(RemoteError::PermissionDenied(path)) => {
            warn!("产品目录 '{}' 权限不足，无法验证，按假定路径继续。", path);
            Ok(())
        }
        Err(e) => Err(AppError::Remote(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryArchive;

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let archive = MemoryArchive::new();
        archive.fail_next_connects(2);
        let config = AppConfig::default();
        establish(&archive, &config).await.unwrap();
        assert_eq!(archive.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_connect_exhausts_attempts() {
        let archive = MemoryArchive::new();
        archive.fail_next_connects(99);
        let config = AppConfig::default();
        let err = establish(&archive, &config).await.unwrap_err();
        assert!(matches!(err, AppError::Connection { attempts: 5, .. }));
        assert_eq!(archive.connect_count(), 5);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let archive = MemoryArchive::new();
        archive.set_auth_fail(true);
        let config = AppConfig::default();
        let err = establish(&archive, &config).await.unwrap_err();
        assert!(matches!(err, AppError::AuthFailed));
        assert_eq!(archive.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_product_is_fatal() {
        let archive = MemoryArchive::new();
        archive.add_dir("MOD021KM");
        verify_product(&archive, "MOD021KM").await.unwrap();
        let err = verify_product(&archive, "MOD35_L2").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidProduct(p) if p == "MOD35_L2"));
    }
}
