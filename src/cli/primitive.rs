//! # primitive 子命令 CLI 定义
//!
//! 读取一个结构文件，约化为原胞后写出。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/primitive.rs`

use crate::error::{XtalkitError, Result};
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};

/// 支持的输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Crystallographic Information File
    Cif,
    /// CASTEP .cell format
    Cell,
    /// VASP POSCAR format
    Poscar,
    /// XYZ format
    Xyz,
    /// XTL format (CrystalMaker)
    Xtl,
    /// JSON dump of the structure model
    Json,
}

impl OutputFormat {
    /// 按输出文件名推断格式
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let format = match ext.as_str() {
            "cif" => OutputFormat::Cif,
            "cell" => OutputFormat::Cell,
            "vasp" | "poscar" => OutputFormat::Poscar,
            "xyz" => OutputFormat::Xyz,
            "xtl" => OutputFormat::Xtl,
            "json" => OutputFormat::Json,
            _ => {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    OutputFormat::Poscar
                } else {
                    return Err(XtalkitError::UnsupportedFormat(format!(
                        "Cannot determine output format for: {} (use --format)",
                        path.display()
                    )));
                }
            }
        };
        Ok(format)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Cif => write!(f, "cif"),
            OutputFormat::Cell => write!(f, "cell"),
            OutputFormat::Poscar => write!(f, "poscar"),
            OutputFormat::Xyz => write!(f, "xyz"),
            OutputFormat::Xtl => write!(f, "xtl"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// primitive 子命令参数
#[derive(Args, Debug)]
pub struct PrimitiveArgs {
    /// Input structure file (.cif, .cell, .vasp, POSCAR/CONTCAR)
    pub input: PathBuf,

    /// Output file; the format follows its extension
    pub output: PathBuf,

    /// Output format, overriding the extension
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Symmetry search tolerance in Angstrom
    #[arg(long, default_value_t = 1e-3)]
    pub symprec: f64,

    /// Angle tolerance in degrees (library default when omitted)
    #[arg(long)]
    pub angle_tolerance: Option<f64>,
}
