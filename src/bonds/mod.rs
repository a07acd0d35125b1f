//! # 键几何查找表模块
//!
//! 从磁盘上的并列数组重建键长、键角、键矢量查找表，
//! 避免从原始坐标重复计算几何量。
//!
//! ## 子模块
//! - `table`: 以复合元组为键的查找表与重复键策略
//! - `builders`: 按文件命名约定加载数组并构建三类表
//!
//! ## 依赖关系
//! - 被 `commands/bonds.rs` 使用
//! - 使用 `parsers/npy.rs`

pub mod builders;
pub mod table;

pub use builders::{build_angle_dict, build_distance_dict, build_vector_dict};
pub use table::{AngleTable, DistanceTable, DuplicatePolicy, VectorTable};
