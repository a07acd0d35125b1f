//! # 解析器模块
//!
//! 提供结构文件（.cif, .cell, POSCAR）与 NumPy `.npy` 数组的解析器。
//!
//! ## 依赖关系
//! - 被 `commands/` 与 `bonds/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: cell, cif, npy, poscar

pub mod cell;
pub mod cif;
pub mod npy;
pub mod poscar;

use crate::error::{XtalkitError, Result};
use crate::models::Crystal;
use std::path::Path;

/// 从文件路径推断格式并解析
///
/// CIF 可以包含多个数据块，因此统一返回结构列表。
pub fn parse_structure_file(path: &Path) -> Result<Vec<Crystal>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "cif" => cif::parse_cif_file(path),
        "cell" => Ok(vec![cell::parse_cell_file(path)?]),
        "vasp" | "poscar" => Ok(vec![poscar::parse_poscar_file(path)?]),
        _ => {
            // 可能是 POSCAR/CONTCAR (无扩展名)
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    return Ok(vec![poscar::parse_poscar_file(path)?]);
                }
            }
            Err(XtalkitError::UnsupportedFormat(format!(
                "Cannot determine format for: {}",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const POSCAR: &str = "Si\n1.0\n5.43 0 0\n0 5.43 0\n0 0 5.43\nSi\n2\nDirect\n0 0 0\n0.25 0.25 0.25\n";

    #[test]
    fn test_dispatch_by_file_name() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let path = dir.path().join("CONTCAR_relaxed");
        fs::write(&path, POSCAR).unwrap();

        let crystals = parse_structure_file(&path).unwrap();
        assert_eq!(crystals.len(), 1);
        assert_eq!(crystals[0].atoms.len(), 2);
    }

    #[test]
    fn test_dispatch_by_extension() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let path = dir.path().join("Si.VASP");
        fs::write(&path, POSCAR).unwrap();

        assert_eq!(parse_structure_file(&path).unwrap()[0].formula(), "Si2");
    }

    #[test]
    fn test_unknown_extension() {
        let err = parse_structure_file(Path::new("structure.res")).unwrap_err();
        assert!(matches!(err, XtalkitError::UnsupportedFormat(_)));
    }
}
