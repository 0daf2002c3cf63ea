//! 远程同步 - 批量上传和批量删除

use crate::core::error::{ObjectFailure, RemotePhase, Result, SyncError};
use crate::core::queue::ObjectOp;
use crate::core::trash::staged_path;
use crate::storage::Storage;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// 单个阶段的执行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseStats {
    pub objects: usize,
    pub bytes: u64,
}

/// 远程同步器
pub struct RemoteSynchronizer {
    storage: Arc<dyn Storage>,
    trash_dir: PathBuf,
    max_concurrent: usize,
}

impl RemoteSynchronizer {
    pub fn new(
        storage: Arc<dyn Storage>,
        trash_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            storage,
            trash_dir: trash_dir.into(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 上传 put 列表中的全部对象，内容读取自暂存区
    ///
    /// 所有上传都结束后才返回；任意一个失败则整个阶段失败。
    pub async fn put_multi_objects(&self, ops: &[ObjectOp]) -> Result<PhaseStats> {
        info!("上传 {} 个对象到 {}", ops.len(), self.storage.name());

        let trash_dir = self.trash_dir.clone();
        self.run_phase(RemotePhase::Put, ops, move |storage, op| {
            let local = staged_path(&trash_dir, &op.path);
            async move {
                let data = tokio::fs::read(&local).await?;
                let size = data.len() as u64;
                storage.write(&op.key, data).await?;
                debug!("已上传: {} ({} bytes)", op.key, size);
                Ok::<u64, anyhow::Error>(size)
            }
        })
        .await
    }

    /// 删除 delete 列表中的全部对象，不存在的对象视为删除成功
    pub async fn delete_multi_objects(&self, ops: &[ObjectOp]) -> Result<PhaseStats> {
        info!("从 {} 删除 {} 个对象", self.storage.name(), ops.len());

        self.run_phase(RemotePhase::Delete, ops, |storage, op| async move {
            storage.delete(&op.key).await?;
            debug!("已删除: {}", op.key);
            Ok::<u64, anyhow::Error>(0)
        })
        .await
    }

    async fn run_phase<F, Fut>(
        &self,
        phase: RemotePhase,
        ops: &[ObjectOp],
        task: F,
    ) -> Result<PhaseStats>
    where
        F: Fn(Arc<dyn Storage>, ObjectOp) -> Fut,
        Fut: Future<Output = anyhow::Result<u64>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(ops.len());

        for op in ops {
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                SyncError::Remote {
                    phase,
                    failures: vec![ObjectFailure {
                        key: op.key.clone(),
                        message: format!("failed to schedule: {}", e),
                    }],
                }
            })?;
            let fut = task(self.storage.clone(), op.clone());

            handles.push(tokio::spawn(async move {
                let result = fut.await;
                drop(permit);
                result
            }));
        }

        // 等待本阶段所有任务结束
        let results = futures::future::join_all(handles).await;

        let mut stats = PhaseStats::default();
        let mut failures = Vec::new();

        for (op, result) in ops.iter().zip(results) {
            match result {
                Ok(Ok(bytes)) => {
                    stats.objects += 1;
                    stats.bytes += bytes;
                }
                Ok(Err(e)) => failures.push(ObjectFailure {
                    key: op.key.clone(),
                    message: format!("{:#}", e),
                }),
                Err(e) => failures.push(ObjectFailure {
                    key: op.key.clone(),
                    message: format!("task failed: {}", e),
                }),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                error!("{} 失败: {}: {}", phase, failure.key, failure.message);
            }
            return Err(SyncError::Remote { phase, failures });
        }

        Ok(stats)
    }
}
