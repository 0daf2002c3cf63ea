//! 状态目录生命周期
//!
//! 布局：
//! - `<source>/.sync/`        状态目录
//! - `<source>/.sync/repo/`   跟踪仓库元数据
//! - `<source>/.sync/trash/`  暂存副本

use crate::core::error::{Result, SyncError};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub const STATE_DIR_NAME: &str = ".sync";
pub const REPO_DIR_NAME: &str = "repo";
pub const TRASH_DIR_NAME: &str = "trash";

/// 本次运行的状态目录初始化分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// 之前没有状态目录
    Fresh,
    /// 增量模式，沿用已有状态目录和暂存区
    Resumed,
    /// 强制上传，整个状态目录被丢弃重建
    Reset,
    /// 非增量模式，仅丢弃暂存区，保留基线
    TrashReset,
}

impl SyncState {
    /// 根据状态目录是否存在和两个模式开关计算初始化分支
    pub fn determine(state_dir_exists: bool, force_upload: bool, incremental: bool) -> Self {
        match (state_dir_exists, force_upload, incremental) {
            (false, _, _) => SyncState::Fresh,
            (true, true, _) => SyncState::Reset,
            (true, false, true) => SyncState::Resumed,
            (true, false, false) => SyncState::TrashReset,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Fresh => write!(f, "fresh"),
            SyncState::Resumed => write!(f, "resumed"),
            SyncState::Reset => write!(f, "reset"),
            SyncState::TrashReset => write!(f, "reset (trash only)"),
        }
    }
}

/// 状态目录路径集合
#[derive(Debug, Clone)]
pub struct StateLayout {
    pub source: PathBuf,
    pub state_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub trash_dir: PathBuf,
}

impl StateLayout {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let state_dir = source.join(STATE_DIR_NAME);
        Self {
            repo_dir: state_dir.join(REPO_DIR_NAME),
            trash_dir: state_dir.join(TRASH_DIR_NAME),
            state_dir,
            source,
        }
    }

    pub fn state_dir_exists(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// 执行状态目录初始化分支
    ///
    /// | 已有状态目录 | forceUpload | incremental | 动作 |
    /// |---|---|---|---|
    /// | 否 | - | - | 创建状态目录 |
    /// | 是 | true | - | 删除并重建状态目录 |
    /// | 是 | false | true | 保持不变 |
    /// | 是 | false | false | 只删除暂存区 |
    pub async fn prepare(&self, force_upload: bool, incremental: bool) -> Result<SyncState> {
        let exists = self.state_dir_exists();
        let state = SyncState::determine(exists, force_upload, incremental);

        info!("状态目录 {:?}: {}", self.state_dir, state);

        match state {
            SyncState::Fresh | SyncState::Resumed => {
                self.create_dirs().await?;
            }
            SyncState::Reset => {
                debug!("丢弃整个状态目录");
                remove_dir_if_exists(&self.state_dir).await?;
                self.create_dirs().await?;
            }
            SyncState::TrashReset => {
                debug!("丢弃暂存区");
                remove_dir_if_exists(&self.trash_dir).await?;
                self.create_dirs().await?;
            }
        }

        Ok(state)
    }

    async fn create_dirs(&self) -> Result<()> {
        for dir in [&self.state_dir, &self.repo_dir, &self.trash_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| SyncError::state_dir(dir, e))?;
        }
        Ok(())
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::state_dir(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_determine_table() {
        assert_eq!(SyncState::determine(false, false, false), SyncState::Fresh);
        assert_eq!(SyncState::determine(false, true, true), SyncState::Fresh);
        assert_eq!(SyncState::determine(true, true, false), SyncState::Reset);
        assert_eq!(SyncState::determine(true, true, true), SyncState::Reset);
        assert_eq!(SyncState::determine(true, false, true), SyncState::Resumed);
        assert_eq!(SyncState::determine(true, false, false), SyncState::TrashReset);
    }

    #[tokio::test]
    async fn test_prepare_fresh_creates_layout() {
        let dir = TempDir::new().unwrap();
        let layout = StateLayout::new(dir.path());

        let state = layout.prepare(false, false).await.unwrap();

        assert_eq!(state, SyncState::Fresh);
        assert!(layout.repo_dir.is_dir());
        assert!(layout.trash_dir.is_dir());
    }

    #[tokio::test]
    async fn test_prepare_force_discards_everything() {
        let dir = TempDir::new().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.prepare(false, false).await.unwrap();
        std::fs::write(layout.repo_dir.join("HEAD"), "ref").unwrap();
        std::fs::write(layout.trash_dir.join("a.txt"), "a").unwrap();

        let state = layout.prepare(true, true).await.unwrap();

        assert_eq!(state, SyncState::Reset);
        assert!(!layout.repo_dir.join("HEAD").exists());
        assert!(!layout.trash_dir.join("a.txt").exists());
        assert!(layout.trash_dir.is_dir());
    }

    #[tokio::test]
    async fn test_prepare_incremental_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.prepare(false, true).await.unwrap();
        std::fs::write(layout.repo_dir.join("HEAD"), "ref").unwrap();
        std::fs::write(layout.trash_dir.join("a.txt"), "a").unwrap();

        let state = layout.prepare(false, true).await.unwrap();

        assert_eq!(state, SyncState::Resumed);
        assert!(layout.repo_dir.join("HEAD").exists());
        assert!(layout.trash_dir.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_prepare_non_incremental_drops_only_trash() {
        let dir = TempDir::new().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.prepare(false, false).await.unwrap();
        std::fs::write(layout.repo_dir.join("HEAD"), "ref").unwrap();
        std::fs::write(layout.trash_dir.join("a.txt"), "a").unwrap();

        let state = layout.prepare(false, false).await.unwrap();

        assert_eq!(state, SyncState::TrashReset);
        assert!(layout.repo_dir.join("HEAD").exists());
        assert!(!layout.trash_dir.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_prepare_reports_unusable_state_dir() {
        let dir = TempDir::new().unwrap();
        let layout = StateLayout::new(dir.path());
        std::fs::write(&layout.state_dir, "occupied").unwrap();

        let err = layout.prepare(false, true).await.unwrap_err();

        match err {
            SyncError::StateDir { path, .. } => assert_eq!(path, layout.state_dir),
            other => panic!("unexpected error: {}", other),
        }
    }
}
