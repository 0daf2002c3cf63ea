//! 操作队列生成 - 把变更跟踪器的状态输出转换成 put/delete 列表

use serde::Serialize;

/// 单条变更类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// 重命名，`from` 为旧的相对路径
    Renamed { from: String },
}

/// 一条状态记录，路径相对于源目录，统一使用 `/` 分隔
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// 队列中的单个对象操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectOp {
    /// 相对源目录的路径
    pub path: String,
    /// 远程对象 key
    pub key: String,
}

/// 一次运行的操作队列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationQueue {
    pub put: Vec<ObjectOp>,
    pub delete: Vec<ObjectOp>,
}

impl OperationQueue {
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.delete.is_empty()
    }
}

/// 规范化目标前缀：去掉首尾的 `/`，统一分隔符
pub fn normalize_prefix(dest: &str) -> String {
    dest.replace('\\', "/").trim_matches('/').to_string()
}

/// 本地相对路径映射到远程 key
pub fn remote_key(prefix: &str, path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

/// 解析状态记录，生成操作队列
///
/// 新增和修改进入 put 列表，删除进入 delete 列表，重命名拆成
/// 删除旧 key 加上传新 key。顺序保持与状态输出一致，不做去重。
pub fn parse(records: &[ChangeRecord], prefix: &str) -> OperationQueue {
    let mut queue = OperationQueue::default();

    let op = |path: &str| ObjectOp {
        path: path.to_string(),
        key: remote_key(prefix, path),
    };

    for record in records {
        match &record.kind {
            ChangeKind::Added | ChangeKind::Modified => queue.put.push(op(&record.path)),
            ChangeKind::Deleted => queue.delete.push(op(&record.path)),
            ChangeKind::Renamed { from } => {
                queue.delete.push(op(from));
                queue.put.push(op(&record.path));
            }
        }
    }

    queue
}
