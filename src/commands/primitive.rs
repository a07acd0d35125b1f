//! # primitive 命令实现
//!
//! 读取结构文件，取第一个结构做原胞约化，按输出格式写出。
//!
//! ## 功能
//! - 解析 .cif / .cell / POSCAR
//! - 使用 `moyo` 找到原胞
//! - 写出 .cif / .cell / POSCAR / .xyz / .xtl / .json
//!
//! ## 依赖关系
//! - 使用 `cli/primitive.rs` 定义的参数
//! - 使用 `parsers/`, `symmetry/`, `models/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::primitive::{OutputFormat, PrimitiveArgs};
use crate::error::{XtalkitError, Result};
use crate::models::Crystal;
use crate::parsers;
use crate::parsers::cell::to_cell_string;
use crate::parsers::cif::to_cif_string;
use crate::parsers::poscar::to_poscar_string;
use crate::symmetry::{primitive_cell, Reduction, SymmetryOptions};
use crate::utils::{output, progress};

use std::fs;
use tabled::{Table, Tabled};

/// 约化前后对比行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Primitive")]
    primitive: String,
}

/// 执行 primitive 命令
pub fn execute(args: PrimitiveArgs) -> Result<()> {
    output::print_header(&format!("Primitive cell of {}", args.input.display()));

    if !args.input.exists() {
        return Err(XtalkitError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }
    if args.symprec <= 0.0 {
        return Err(XtalkitError::InvalidArgument(format!(
            "symprec must be positive, got {}",
            args.symprec
        )));
    }

    // 先确定输出格式，避免白跑一次对称性搜索
    let format = match args.format {
        Some(format) => format,
        None => OutputFormat::from_path(&args.output)?,
    };

    let mut crystals = parsers::parse_structure_file(&args.input)?;
    if crystals.is_empty() {
        return Err(XtalkitError::ParseError {
            format: "structure".to_string(),
            path: args.input.display().to_string(),
            reason: "No structure found".to_string(),
        });
    }
    if crystals.len() > 1 {
        output::print_info(&format!(
            "Found {} structures, using the first one ('{}')",
            crystals.len(),
            crystals[0].name
        ));
    }
    let crystal = crystals.swap_remove(0);

    let options = SymmetryOptions {
        symprec: args.symprec,
        angle_tolerance: args.angle_tolerance,
    };

    let spinner = progress::create_spinner("Searching symmetry...");
    let reduction = primitive_cell(&crystal, &options);
    spinner.finish_and_clear();
    let reduction = reduction?;

    println!("{}", Table::new(summary_rows(&crystal, &reduction)));

    if reduction.multiplicity == 1 {
        output::print_warning("Input is already primitive");
    }

    let content = render(&reduction.primitive, format)?;
    fs::write(&args.output, content).map_err(|e| XtalkitError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    output::print_success(&format!(
        "Primitive cell ({} atoms, space group {}) written to '{}' as {}",
        reduction.primitive.atoms.len(),
        reduction.space_group_number,
        args.output.display(),
        format
    ));

    Ok(())
}

fn summary_rows(input: &Crystal, reduction: &Reduction) -> Vec<SummaryRow> {
    let prim = &reduction.primitive;
    let row = |property: &str, input: String, primitive: String| SummaryRow {
        property: property.to_string(),
        input,
        primitive,
    };

    vec![
        row("Formula", input.formula(), prim.formula()),
        row(
            "Atoms",
            input.atoms.len().to_string(),
            prim.atoms.len().to_string(),
        ),
        row(
            "Volume (Å³)",
            format!("{:.4}", input.volume()),
            format!("{:.4}", prim.volume()),
        ),
        row(
            "Space group",
            input.space_group.clone().unwrap_or_else(|| "-".to_string()),
            reduction.space_group_number.to_string(),
        ),
    ]
}

/// 按目标格式序列化
fn render(crystal: &Crystal, format: OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Cif => to_cif_string(crystal),
        OutputFormat::Cell => to_cell_string(crystal),
        OutputFormat::Poscar => to_poscar_string(crystal),
        OutputFormat::Xyz => to_xyz_string(crystal),
        OutputFormat::Xtl => to_xtl_string(crystal),
        OutputFormat::Json => serde_json::to_string_pretty(crystal)? + "\n",
    };
    Ok(content)
}

// ─────────────────────────────────────────────────────────────
// 仅输出的格式
// ─────────────────────────────────────────────────────────────

/// 转换为 XYZ 格式（笛卡尔坐标）
fn to_xyz_string(crystal: &Crystal) -> String {
    let mut result = String::new();
    result.push_str(&format!("{}\n", crystal.atoms.len()));
    result.push_str(&format!("{}\n", crystal.name));

    for atom in &crystal.atoms {
        let [x, y, z] = crystal.lattice.frac_to_cart(atom.position);
        result.push_str(&format!(
            "{} {:16.10} {:16.10} {:16.10}\n",
            atom.element, x, y, z
        ));
    }

    result
}

/// 转换为 XTL 格式 (CrystalMaker)
fn to_xtl_string(crystal: &Crystal) -> String {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();

    let mut result = String::new();
    result.push_str(&format!("TITLE {}\n", crystal.name));
    result.push_str(&format!(
        "CELL\n  {:.6} {:.6} {:.6} {:.4} {:.4} {:.4}\n",
        a, b, c, alpha, beta, gamma
    ));
    result.push_str("SYMMETRY NUMBER 1\n");
    result.push_str("SYMMETRY LABEL P1\n");
    result.push_str("ATOMS\n");
    result.push_str("NAME       X          Y          Z\n");

    for atom in &crystal.atoms {
        result.push_str(&format!(
            "{:4} {:10.6} {:10.6} {:10.6}\n",
            atom.element, atom.position[0], atom.position[1], atom.position[2]
        ));
    }

    result.push_str("EOF\n");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};
    use std::path::Path;

    const FCC_CIF: &str = "\
data_Cu
_cell_length_a 3.615
_cell_length_b 3.615
_cell_length_c 3.615
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Cu1 0.0 0.0 0.0
Cu2 0.0 0.5 0.5
Cu3 0.5 0.0 0.5
Cu4 0.5 0.5 0.0
";

    fn args(input: &Path, output: &Path) -> PrimitiveArgs {
        PrimitiveArgs {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            format: None,
            symprec: 1e-3,
            angle_tolerance: None,
        }
    }

    #[test]
    fn test_execute_fcc_cif_to_poscar() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let input = dir.path().join("Cu.cif");
        let output = dir.path().join("Cu_prim.vasp");
        fs::write(&input, FCC_CIF).unwrap();

        execute(args(&input, &output)).unwrap();

        let prim = &parsers::parse_structure_file(&output).unwrap()[0];
        assert_eq!(prim.atoms.len(), 1);
        assert!((prim.volume() - 3.615f64.powi(3) / 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_execute_format_override() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let input = dir.path().join("Cu.cif");
        let output = dir.path().join("Cu_prim.out");
        fs::write(&input, FCC_CIF).unwrap();

        let mut args = args(&input, &output);
        args.format = Some(OutputFormat::Json);
        execute(args).unwrap();

        let written: Crystal =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.atoms.len(), 1);
        assert_eq!(written.space_group.as_deref(), Some("225"));
    }

    #[test]
    fn test_execute_missing_input() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let err = execute(args(&dir.path().join("none.cif"), &dir.path().join("o.cif")))
            .unwrap_err();
        assert!(matches!(err, XtalkitError::FileNotFound { .. }));
    }

    #[test]
    fn test_execute_unknown_output_format() {
        let dir = tempdir::TempDir::new("xtalkit").unwrap();
        let input = dir.path().join("Cu.cif");
        let output = dir.path().join("Cu_prim.txt");
        fs::write(&input, FCC_CIF).unwrap();

        let err = execute(args(&input, &output)).unwrap_err();
        assert!(matches!(err, XtalkitError::UnsupportedFormat(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_xyz_uses_cartesian_coordinates() {
        let lattice = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let crystal = Crystal::new("Po", lattice, vec![Atom::new("Po", [0.5, 0.25, 0.0])]);

        let xyz = to_xyz_string(&crystal);
        let fields: Vec<f64> = xyz
            .lines()
            .nth(2)
            .unwrap()
            .split_whitespace()
            .skip(1)
            .map(|s| s.parse().unwrap())
            .collect();

        assert_eq!(xyz.lines().next(), Some("1"));
        assert!((fields[0] - 2.0).abs() < 1e-9);
        assert!((fields[1] - 1.0).abs() < 1e-9);
        assert!(fields[2].abs() < 1e-9);
    }

    #[test]
    fn test_xtl_layout() {
        let lattice = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let crystal = Crystal::new("Po", lattice, vec![Atom::new("Po", [0.0, 0.0, 0.0])]);

        let xtl = to_xtl_string(&crystal);
        assert!(xtl.starts_with("TITLE Po\nCELL\n"));
        assert!(xtl.ends_with("EOF\n"));
    }
}
