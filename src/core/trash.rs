//! Trash 暂存区 - 在比对之前把源文件复制到暂存区
//!
//! 变更跟踪器以暂存区作为工作区，上传时也读取这里的副本，
//! 因此上传、比对和提交看到的是同一份内容。

use crate::core::error::{Result, SyncError};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 暂存选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    /// 增量模式：内容相同的已暂存副本直接复用，只复制新增或修改的文件
    pub modified: bool,
    /// 先清空之前运行留下的暂存内容
    pub clobber: bool,
}

/// 暂存统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub copied: usize,
    pub reused: usize,
    pub removed: usize,
    pub bytes_copied: u64,
}

/// 排除规则匹配
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
enum Rule {
    /// `prefix/**/suffix` 形式
    DoubleStar { prefix: String, suffix: String },
    Glob(Regex),
    Exact(String),
}

impl ExcludeMatcher {
    pub fn new(patterns: &[String]) -> Self {
        let rules = patterns
            .iter()
            .map(|p| p.to_lowercase())
            .map(|pattern| {
                let parts: Vec<&str> = pattern.split("**").collect();
                if parts.len() == 2 {
                    return Rule::DoubleStar {
                        prefix: parts[0].trim_end_matches('/').to_string(),
                        suffix: parts[1].trim_start_matches('/').to_string(),
                    };
                }
                if pattern.contains('*') {
                    let body = pattern
                        .split('*')
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(".*");
                    match Regex::new(&format!("^{}$", body)) {
                        Ok(re) => return Rule::Glob(re),
                        Err(e) => warn!("排除规则无法编译，按精确匹配处理: {} ({})", pattern, e),
                    }
                }
                Rule::Exact(pattern)
            })
            .collect();

        Self { rules }
    }

    /// 相对路径（`/` 分隔）是否被排除
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.rules.iter().any(|rule| match rule {
            Rule::DoubleStar { prefix, suffix } => {
                let under_prefix = prefix.is_empty()
                    || path == *prefix
                    || path.starts_with(&format!("{}/", prefix));
                under_prefix && (suffix.is_empty() || path.ends_with(suffix.as_str()))
            }
            Rule::Glob(re) => re.is_match(&path),
            Rule::Exact(p) => path == *p || path.ends_with(&format!("/{}", p)),
        })
    }
}

/// Trash 暂存器
pub struct TrashStager {
    excludes: ExcludeMatcher,
}

impl TrashStager {
    pub fn new(excludes: ExcludeMatcher) -> Self {
        Self { excludes }
    }

    /// 把 `source` 暂存到 `trash`，跳过 `state_dir`
    ///
    /// 任何 I/O 错误都会中止暂存，已经写入的部分保留在原处。
    pub async fn stage(
        &self,
        source: &Path,
        state_dir: &Path,
        trash: &Path,
        options: StageOptions,
    ) -> Result<StageSummary> {
        let task_source = source.to_path_buf();
        let state_dir = state_dir.to_path_buf();
        let trash = trash.to_path_buf();
        let excludes = self.excludes.clone();

        info!(
            "暂存文件: {:?} -> {:?} (modified={}, clobber={})",
            source, trash, options.modified, options.clobber
        );

        let summary = tokio::task::spawn_blocking(move || {
            stage_blocking(&task_source, &state_dir, &trash, options, &excludes)
        })
        .await
        .map_err(|e| stage_task_failed(source, e))??;

        info!(
            "暂存完成: 复制 {} 个, 复用 {} 个, 移除 {} 个",
            summary.copied, summary.reused, summary.removed
        );

        Ok(summary)
    }
}

fn stage_task_failed(source: &Path, e: JoinError) -> SyncError {
    SyncError::stage(source, io::Error::new(io::ErrorKind::Other, e))
}

fn stage_blocking(
    source: &Path,
    state_dir: &Path,
    trash: &Path,
    options: StageOptions,
    excludes: &ExcludeMatcher,
) -> Result<StageSummary> {
    let mut summary = StageSummary::default();

    if options.clobber && trash.exists() {
        debug!("清空暂存区: {:?}", trash);
        fs::remove_dir_all(trash).map_err(|e| SyncError::stage(trash, e))?;
    }
    fs::create_dir_all(trash).map_err(|e| SyncError::stage(trash, e))?;

    let files = collect_sources(source, state_dir, excludes)?;

    // 先清理过期条目，文件和目录互换时旧条目不会挡住复制
    let keep: HashSet<PathBuf> = files.iter().cloned().collect();
    summary.removed = prune(trash, &keep)?;

    for relative in &files {
        let from = source.join(relative);
        let staged = trash.join(relative);

        if options.modified && same_content(&from, &staged)? {
            summary.reused += 1;
            continue;
        }

        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::stage(parent, e))?;
        }
        let bytes = fs::copy(&from, &staged).map_err(|e| SyncError::stage(&from, e))?;
        summary.copied += 1;
        summary.bytes_copied += bytes;
    }

    Ok(summary)
}

/// 需要暂存的普通文件，返回相对 `source` 的路径
fn collect_sources(
    source: &Path,
    state_dir: &Path,
    excludes: &ExcludeMatcher,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != state_dir);

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(source, e))?;

        // 只同步普通文件，符号链接不跟随
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_path(source, entry.path())?;
        let display_path = relative.to_string_lossy().replace('\\', "/");
        if excludes.is_excluded(&display_path) {
            debug!("排除文件: {}", display_path);
            continue;
        }

        // 对象 key 必须是 UTF-8，不能用替换字符把两个文件映射到同一个名字
        if relative.to_str().is_none() {
            return Err(SyncError::stage(
                entry.path(),
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            ));
        }

        files.push(relative.to_path_buf());
    }

    Ok(files)
}

/// 删除源目录中已不存在的暂存条目和随之变空的目录
fn prune(trash: &Path, keep: &HashSet<PathBuf>) -> Result<usize> {
    let mut removed = 0;

    for entry in WalkDir::new(trash).contents_first(true).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(trash, e))?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            let empty = fs::read_dir(path)
                .map_err(|e| SyncError::stage(path, e))?
                .next()
                .is_none();
            if empty {
                fs::remove_dir(path).map_err(|e| SyncError::stage(path, e))?;
            }
            continue;
        }

        let relative = relative_path(trash, path)?;
        if !keep.contains(relative) {
            debug!("移除过期暂存: {:?}", relative);
            fs::remove_file(path).map_err(|e| SyncError::stage(path, e))?;
            removed += 1;
        }
    }

    Ok(removed)
}

fn walk_error(root: &Path, e: walkdir::Error) -> SyncError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    SyncError::stage(path, io::Error::from(e))
}

fn relative_path<'a>(base: &Path, path: &'a Path) -> Result<&'a Path> {
    path.strip_prefix(base).map_err(|_| {
        SyncError::stage(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path outside of source tree"),
        )
    })
}

/// 大小和 blake3 哈希都一致才认为内容相同
fn same_content(source: &Path, staged: &Path) -> Result<bool> {
    let staged_meta = match fs::metadata(staged) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(SyncError::stage(staged, e)),
    };
    let source_meta = fs::metadata(source).map_err(|e| SyncError::stage(source, e))?;

    if !staged_meta.is_file() || staged_meta.len() != source_meta.len() {
        return Ok(false);
    }

    Ok(hash_file(source)? == hash_file(staged)?)
}

fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let mut file = fs::File::open(path).map_err(|e| SyncError::stage(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SyncError::stage(path, e))?;
    Ok(hasher.finalize())
}

/// 暂存区中某个相对路径对应的文件
pub fn staged_path(trash: &Path, relative: &str) -> PathBuf {
    trash.join(relative)
}
