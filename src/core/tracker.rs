//! 变更跟踪器 - 用 git 作为内容比对引擎
//!
//! git 目录位于状态目录下，工作区指向 trash 暂存区，
//! 每次同步成功后提交一次作为新的基线。

use crate::core::error::{Result, SyncError};
use crate::core::queue::{ChangeKind, ChangeRecord};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// 变更跟踪器接口
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    /// 创建或复用跟踪仓库（幂等）
    async fn init(&self) -> Result<()>;

    /// 暂存工作区的全部当前状态
    async fn add(&self) -> Result<()>;

    /// 工作区相对基线的差异，顺序与 git 输出一致
    async fn status(&self) -> Result<Vec<ChangeRecord>>;

    /// 推进基线，没有变化时也会提交
    async fn commit(&self) -> Result<()>;
}

/// 基于 git 命令行的跟踪器
pub struct GitTracker {
    git_binary: PathBuf,
    git_dir: PathBuf,
    work_tree: PathBuf,
}

/// 覆盖用户全局配置，保证输出格式和提交行为稳定
const GIT_OVERRIDES: &[&str] = &[
    "core.quotepath=false",
    "core.autocrlf=false",
    "core.safecrlf=false",
    "status.renames=true",
    "commit.gpgsign=false",
    "user.name=ossync",
    "user.email=ossync@localhost",
];

impl GitTracker {
    pub fn new(
        git_binary: impl Into<PathBuf>,
        git_dir: impl Into<PathBuf>,
        work_tree: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git_binary: git_binary.into(),
            git_dir: git_dir.into(),
            work_tree: work_tree.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.arg("--git-dir")
            .arg(&self.git_dir)
            .arg("--work-tree")
            .arg(&self.work_tree);
        for item in GIT_OVERRIDES {
            cmd.arg("-c").arg(item);
        }
        // pathspec 相对于工作区解析
        cmd.current_dir(&self.work_tree)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// 执行 git 子命令并返回 stdout
    async fn run(&self, op: &'static str, args: &[&str]) -> Result<Vec<u8>> {
        debug!("git {}", args.join(" "));

        let output = self
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::Tracker {
                op,
                message: format!("failed to launch {}: {}", self.git_binary.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SyncError::Tracker {
                op,
                message: if stderr.is_empty() {
                    format!("git exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ChangeTracker for GitTracker {
    async fn init(&self) -> Result<()> {
        self.run("init", &["init", "--quiet"]).await?;
        Ok(())
    }

    async fn add(&self) -> Result<()> {
        // --force: 用户全局 gitignore 不能影响同步范围
        self.run("add", &["add", "--all", "--force", "--", "."]).await?;
        Ok(())
    }

    async fn status(&self) -> Result<Vec<ChangeRecord>> {
        let output = self
            .run(
                "status",
                &["status", "--porcelain", "-z", "--untracked-files=all"],
            )
            .await?;
        parse_porcelain(&output)
    }

    async fn commit(&self) -> Result<()> {
        let message = format!("ossync {}", chrono::Utc::now().to_rfc3339());
        self.run(
            "commit",
            &[
                "commit",
                "--quiet",
                "--allow-empty",
                "--no-verify",
                "-m",
                &message,
            ],
        )
        .await?;
        Ok(())
    }
}

/// 解析 `git status --porcelain -z` 输出
///
/// 每条记录为 `XY PATH\0`，重命名和复制后面再跟一个 `ORIG\0`。
/// 所有变更都已经 add 过，因此以暂存区列 X 为准，X 为空时退回到 Y。
pub fn parse_porcelain(output: &[u8]) -> Result<Vec<ChangeRecord>> {
    let malformed = |entry: &[u8]| SyncError::Tracker {
        op: "status",
        message: format!(
            "unexpected status entry: {:?}",
            String::from_utf8_lossy(entry)
        ),
    };

    let mut records = Vec::new();
    let mut entries = output.split(|b| *b == 0).filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 || entry[2] != b' ' {
            return Err(malformed(entry));
        }

        let code = if entry[0] == b' ' { entry[1] } else { entry[0] };
        let path = String::from_utf8_lossy(&entry[3..]).into_owned();

        let kind = match code {
            b'A' | b'?' | b'C' => ChangeKind::Added,
            b'M' | b'T' => ChangeKind::Modified,
            b'D' => ChangeKind::Deleted,
            b'R' => {
                let from = entries.next().ok_or_else(|| malformed(entry))?;
                ChangeKind::Renamed {
                    from: String::from_utf8_lossy(from).into_owned(),
                }
            }
            _ => return Err(malformed(entry)),
        };

        // 复制记录也带有原路径，直接丢弃
        if code == b'C' {
            entries.next().ok_or_else(|| malformed(entry))?;
        }

        records.push(ChangeRecord::new(path, kind));
    }

    Ok(records)
}
