//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `symmetry/`, `bonds/`, `utils/`
//! - 子模块: primitive, bonds

pub mod bonds;
pub mod primitive;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Primitive(args) => primitive::execute(args),
        Commands::Bonds(args) => bonds::execute(args),
    }
}
