//! # xtalkit - 晶体结构小工具集
//!
//! 两个互不相关的子命令，打包成单一可执行文件。
//!
//! ## 子命令
//! - `primitive` - 将结构文件约化为原胞 (.cif, .cell, POSCAR)
//! - `bonds`     - 从 `.npy` 数组重建距离/键角/键矢量查找表
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (结构与 .npy 解析器)
//!   │     ├── symmetry/  (原胞约化)
//!   │     ├── bonds/     (查找表)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod bonds;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod symmetry;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
