//! # 键关系查找表
//!
//! 以复合元组 `(i, j)` / `(i, j, k)` 为键的扁平哈希表，
//! 对应按行存储的并列索引数组中的一行。
//!
//! ## 依赖关系
//! - 被 `bonds/builders.rs` 和 `commands/bonds.rs` 使用

use crate::error::{XtalkitError, Result};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// 原子索引组成的键路径
pub trait KeyPath: Copy + Eq + Hash + Debug {
    /// 第一个（源）原子索引
    fn source(&self) -> usize;

    /// 形如 `[148][62]` 的路径描述
    fn describe(&self) -> String;
}

impl KeyPath for (usize, usize) {
    fn source(&self) -> usize {
        self.0
    }

    fn describe(&self) -> String {
        format!("[{}][{}]", self.0, self.1)
    }
}

impl KeyPath for (usize, usize, usize) {
    fn source(&self) -> usize {
        self.0
    }

    fn describe(&self) -> String {
        format!("[{}][{}][{}]", self.0, self.1, self.2)
    }
}

/// 重复键处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// 后出现的行覆盖先出现的行
    #[default]
    Overwrite,
    /// 遇到重复键时报错
    Reject,
}

/// 关系查找表
#[derive(Debug, Clone)]
pub struct RelationTable<K, V> {
    relation: &'static str,
    entries: HashMap<K, V>,
}

/// distance[(i, j)] = d (Å)
pub type DistanceTable = RelationTable<(usize, usize), f64>;
/// angle[(i, j, k)] = theta
pub type AngleTable = RelationTable<(usize, usize, usize), f64>;
/// vector[(i, j)] = V[:, n]
pub type VectorTable = RelationTable<(usize, usize), Vec<f64>>;

impl<K: KeyPath, V> RelationTable<K, V> {
    /// 按行序构建
    pub fn from_rows<I>(relation: &'static str, rows: I, policy: DuplicatePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries = HashMap::new();

        for (row, (key, value)) in rows.into_iter().enumerate() {
            if entries.insert(key, value).is_some() && policy == DuplicatePolicy::Reject {
                return Err(XtalkitError::DuplicateKey {
                    relation: relation.to_string(),
                    key: key.describe(),
                    row,
                });
            }
        }

        Ok(RelationTable { relation, entries })
    }

    pub fn relation(&self) -> &'static str {
        self.relation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// 查找键，缺失时返回 `KeyNotFound`
    pub fn lookup(&self, key: K) -> Result<&V> {
        self.get(&key)
            .ok_or_else(|| XtalkitError::KeyNotFound {
                relation: self.relation.to_string(),
                key: key.describe(),
            })
    }

    /// 源原子为 `i` 的所有条目
    pub fn partners(&self, i: usize) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().filter(move |(key, _)| key.source() == i)
    }
}
