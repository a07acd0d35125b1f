//! # bonds 子命令 CLI 定义
//!
//! 默认参数即演示用的晶体与原子编号；名称和目录也可以通过环境变量给出。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/bonds.rs`

use clap::Args;
use std::path::PathBuf;

/// bonds 子命令参数
#[derive(Args, Debug)]
pub struct BondsArgs {
    /// Crystal name used as the .npy file prefix
    #[arg(long, env = "XTALKIT_NAME", default_value = "str_m7_o9_o24_bcu_sym.59")]
    pub name: String,

    /// Directory holding the .npy arrays
    #[arg(long, env = "XTALKIT_DIR", default_value = "data/graphs")]
    pub dir: PathBuf,

    /// First atom index
    #[arg(short, default_value_t = 148)]
    pub i: usize,

    /// Second (central) atom index
    #[arg(short, default_value_t = 62)]
    pub j: usize,

    /// Third atom index
    #[arg(short, default_value_t = 78)]
    pub k: usize,

    /// Fail on repeated keys instead of keeping the last row
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Also list every bonded neighbor of atom i with its distance
    #[arg(long, default_value_t = false)]
    pub neighbors: bool,
}
