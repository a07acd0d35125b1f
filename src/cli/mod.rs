//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `primitive`: 结构文件约化为原胞
//! - `bonds`: 从 `.npy` 数组重建距离/键角/键矢量查找表
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: primitive, bonds

pub mod bonds;
pub mod primitive;

use clap::{Parser, Subcommand};

/// xtalkit - 晶体结构小工具集
#[derive(Parser)]
#[command(name = "xtalkit")]
#[command(version)]
#[command(about = "Small utilities for computational crystallography workflows", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Reduce a structure file (.cif, .cell, POSCAR) to its primitive cell
    Primitive(primitive::PrimitiveArgs),

    /// Rebuild distance/angle/vector lookup tables from .npy arrays
    Bonds(bonds::BondsArgs),
}
