pub mod local;
#[cfg(test)]
pub mod memory;
pub mod s3;

use crate::config::{StorageConfig, StorageType};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use local::LocalStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 对象存储抽象接口，key 统一使用 `/` 分隔
///
/// 同步只需要覆盖写和删除，比对由变更跟踪器完成，不读取远端。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 写入整个对象
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// 删除对象，对象不存在视为成功
    async fn delete(&self, key: &str) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.typ {
        StorageType::Local => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Local storage requires path"))?;
            tracing::info!("初始化本地存储: {}", path);
            Ok(Arc::new(LocalStorage::new(path)?) as Arc<dyn Storage>)
        }
        StorageType::S3 => {
            let bucket = config
                .bucket
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires bucket"))?;
            let region = config.region.as_deref().unwrap_or("auto");
            tracing::info!("初始化S3存储: bucket={}, region={}", bucket, region);
            Ok(Arc::new(
                S3Storage::new(
                    bucket,
                    region,
                    config.access_key.clone(),
                    config.secret_key.clone(),
                    config.endpoint.clone(),
                    config.root.clone(),
                )
                .await?,
            ) as Arc<dyn Storage>)
        }
    }
}
