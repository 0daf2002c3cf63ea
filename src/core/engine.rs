//! 同步编排 - 状态目录初始化 → 生成队列 → 处理队列 → 提交基线

use crate::config::SyncSettings;
use crate::core::error::{Result, SyncError};
use crate::core::queue::{self, OperationQueue};
use crate::core::remote::{PhaseStats, RemoteSynchronizer};
use crate::core::state::{StateLayout, SyncState};
use crate::core::tracker::{ChangeTracker, GitTracker};
use crate::core::trash::{ExcludeMatcher, StageOptions, StageSummary, TrashStager};
use crate::storage::Storage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 源目录
    pub source: PathBuf,
    /// 目标 key 前缀（已去掉首尾 `/`）
    pub dest: String,
    /// 丢弃状态目录，全量重新上传
    pub force_upload: bool,
    /// 增量模式，保留暂存区以便续传
    pub incremental_mode: bool,
    /// 最大并发传输数
    pub max_concurrent_transfers: usize,
    /// 排除规则
    pub exclude_patterns: Vec<String>,
    /// git 可执行文件
    pub git_binary: String,
}

impl SyncConfig {
    pub fn new(source: impl Into<PathBuf>, dest: &str) -> Self {
        Self::with_settings(source, dest, &SyncSettings::default())
    }

    pub fn with_settings(source: impl Into<PathBuf>, dest: &str, settings: &SyncSettings) -> Self {
        Self {
            source: source.into(),
            dest: queue::normalize_prefix(dest),
            force_upload: false,
            incremental_mode: false,
            max_concurrent_transfers: settings.max_concurrent_transfers,
            exclude_patterns: settings.exclude_patterns.clone(),
            git_binary: settings.git_binary.clone(),
        }
    }
}

/// 单个阶段耗时
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub label: &'static str,
    pub elapsed_ms: u64,
    pub total_ms: u64,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub state: SyncState,
    pub start_time: i64,
    pub end_time: i64,
    pub staged: StageSummary,
    pub queue: OperationQueue,
    pub files_uploaded: usize,
    pub files_deleted: usize,
    pub bytes_transferred: u64,
    pub phases: Vec<PhaseTiming>,
    pub duration: u64,
}

/// 阶段计时，每完成一个阶段输出一行
struct Profiler {
    start: Instant,
    phases: Vec<PhaseTiming>,
}

impl Profiler {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            phases: Vec::new(),
        }
    }

    fn record(&mut self, label: &'static str, started: Instant) {
        let timing = PhaseTiming {
            label,
            elapsed_ms: started.elapsed().as_millis() as u64,
            total_ms: self.start.elapsed().as_millis() as u64,
        };
        println!("  {} takes: {}ms of {}ms", label, timing.elapsed_ms, timing.total_ms);
        debug!("{}: {}ms", label, timing.elapsed_ms);
        self.phases.push(timing);
    }
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncConfig,
    layout: StateLayout,
    tracker: Arc<dyn ChangeTracker>,
    stager: TrashStager,
    remote: RemoteSynchronizer,
}

impl SyncEngine {
    /// 使用 git 作为变更跟踪器
    pub fn new(config: SyncConfig, storage: Arc<dyn Storage>) -> Self {
        let layout = StateLayout::new(&config.source);
        let tracker = Arc::new(GitTracker::new(
            &config.git_binary,
            &layout.repo_dir,
            &layout.trash_dir,
        ));
        Self::with_tracker(config, storage, tracker)
    }

    pub fn with_tracker(
        config: SyncConfig,
        storage: Arc<dyn Storage>,
        tracker: Arc<dyn ChangeTracker>,
    ) -> Self {
        let layout = StateLayout::new(&config.source);
        let stager = TrashStager::new(ExcludeMatcher::new(&config.exclude_patterns));
        let remote = RemoteSynchronizer::new(
            storage,
            &layout.trash_dir,
            config.max_concurrent_transfers,
        );
        Self {
            config,
            layout,
            tracker,
            stager,
            remote,
        }
    }

    /// 运行一次完整同步
    ///
    /// 任一阶段失败都直接返回错误，基线只在所有上传和删除成功后推进。
    pub async fn exec(&self) -> Result<SyncReport> {
        info!("开始同步: {:?} -> {:?}", self.config.source, self.config.dest);

        let result = self.run().await;

        match &result {
            Ok(report) => info!(
                "同步完成: 上传 {} 个, 删除 {} 个, 耗时 {}ms",
                report.files_uploaded, report.files_deleted, report.duration
            ),
            Err(e) => error!("同步失败: {}", e),
        }

        result
    }

    async fn run(&self) -> Result<SyncReport> {
        if !self.config.source.is_dir() {
            return Err(SyncError::Config(format!(
                "source {:?} is not a directory",
                self.config.source
            )));
        }

        let start_time = chrono::Utc::now().timestamp();
        let mut profiler = Profiler::new();

        let started = Instant::now();
        let (state, staged) = self.init(&mut profiler).await?;
        profiler.record("Initialization(init)", started);

        let started = Instant::now();
        let queue = self.generate_queue(&mut profiler).await?;
        profiler.record("Queue generation(qgen)", started);

        let started = Instant::now();
        let (uploaded, deleted) = self.handle_queue(&queue, &mut profiler).await?;
        profiler.record("Queue processing(qproc)", started);

        Ok(SyncReport {
            state,
            start_time,
            end_time: chrono::Utc::now().timestamp(),
            staged,
            files_uploaded: uploaded.objects,
            files_deleted: deleted.objects,
            bytes_transferred: uploaded.bytes,
            queue,
            duration: profiler.start.elapsed().as_millis() as u64,
            phases: profiler.phases,
        })
    }

    /// 初始化状态目录和跟踪仓库，并暂存文件
    async fn init(&self, profiler: &mut Profiler) -> Result<(SyncState, StageSummary)> {
        debug!("Sync init");

        let state = self
            .layout
            .prepare(self.config.force_upload, self.config.incremental_mode)
            .await?;

        self.tracker.init().await?;

        let started = Instant::now();
        let staged = self
            .stager
            .stage(
                &self.layout.source,
                &self.layout.state_dir,
                &self.layout.trash_dir,
                StageOptions {
                    modified: self.config.incremental_mode,
                    clobber: !self.config.incremental_mode,
                },
            )
            .await?;
        profiler.record("init - file comparison", started);

        Ok((state, staged))
    }

    /// 用跟踪器的状态差异生成操作队列
    async fn generate_queue(&self, profiler: &mut Profiler) -> Result<OperationQueue> {
        self.tracker.add().await?;

        let started = Instant::now();
        let status = self.tracker.status().await?;
        profiler.record("qgen - git status", started);

        let queue = queue::parse(&status, &self.config.dest);
        info!(
            "操作队列: 上传 {} 个, 删除 {} 个",
            queue.put.len(),
            queue.delete.len()
        );
        debug!("操作队列: {:?}", queue);

        Ok(queue)
    }

    /// 先上传，再删除，全部成功后提交基线
    async fn handle_queue(
        &self,
        queue: &OperationQueue,
        profiler: &mut Profiler,
    ) -> Result<(PhaseStats, PhaseStats)> {
        let started = Instant::now();
        let uploaded = self.remote.put_multi_objects(&queue.put).await?;
        profiler.record("qproc - oss uploading", started);

        let started = Instant::now();
        let deleted = self.remote.delete_multi_objects(&queue.delete).await?;
        profiler.record("qproc - oss deletion", started);

        let started = Instant::now();
        self.tracker.commit().await?;
        profiler.record("qproc - git commit", started);

        Ok((uploaded, deleted))
    }
}
