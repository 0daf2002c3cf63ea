//! 同步流程错误类型

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 远程操作所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePhase {
    Put,
    Delete,
}

impl fmt::Display for RemotePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotePhase::Put => write!(f, "put"),
            RemotePhase::Delete => write!(f, "delete"),
        }
    }
}

/// 单个对象操作失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFailure {
    pub key: String,
    pub message: String,
}

/// 同步流程中的所有致命错误，任何一个都会中止后续阶段
#[derive(Debug, Error)]
pub enum SyncError {
    /// 状态目录创建/删除失败
    #[error("state directory {path:?}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 暂存文件到 trash 失败
    #[error("failed to stage {path:?}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 变更跟踪器（git）操作失败
    #[error("change tracker `{op}` failed: {message}")]
    Tracker { op: &'static str, message: String },

    /// 远程 put/delete 阶段失败
    #[error(
        "remote {phase} phase failed for {} object(s): {}",
        .failures.len(),
        format_failures(.failures)
    )]
    Remote {
        phase: RemotePhase,
        failures: Vec<ObjectFailure>,
    },

    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 存储后端错误
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    pub(crate) fn state_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::StateDir {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn stage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Stage {
            path: path.into(),
            source,
        }
    }

    /// 失败对象的 key 列表
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            SyncError::Remote { failures, .. } => failures.iter().map(|f| f.key.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[ObjectFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.key, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_lists_every_key() {
        let err = SyncError::Remote {
            phase: RemotePhase::Delete,
            failures: vec![
                ObjectFailure {
                    key: "site/a.txt".to_string(),
                    message: "denied".to_string(),
                },
                ObjectFailure {
                    key: "site/b.txt".to_string(),
                    message: "timeout".to_string(),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("remote delete phase failed for 2 object(s)"));
        assert!(text.contains("site/a.txt (denied)"));
        assert!(text.contains("site/b.txt (timeout)"));
        assert_eq!(err.failed_keys(), vec!["site/a.txt", "site/b.txt"]);
    }
}
