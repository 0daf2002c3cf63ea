//! ossync - 以 git 状态差异驱动的目录到对象存储同步工具
//!
//! 流程：状态目录初始化 → 暂存文件 → git status 生成操作队列 →
//! 上传 → 删除 → git commit 推进基线。任一步失败都不会提交，
//! 下次运行时 diff 会重新包含未完成的变更。

pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, StorageConfig, StorageType, SyncSettings};
pub use core::{SyncConfig, SyncEngine, SyncError, SyncReport, SyncState};

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
