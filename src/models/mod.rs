//! # 数据模型模块
//!
//! 定义统一的晶体结构数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`symmetry/` 和 `commands/` 使用
//! - 子模块: structure

pub mod structure;

pub use structure::{wrap_fractional, Atom, Crystal, Lattice};
