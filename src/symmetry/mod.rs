//! # 对称性模块
//!
//! 对称性搜索本身交给 `moyo`，这里只负责模型转换。
//!
//! ## 依赖关系
//! - 被 `commands/primitive.rs` 使用
//! - 子模块: primitive

pub mod primitive;

pub use primitive::{primitive_cell, Reduction, SymmetryOptions};
