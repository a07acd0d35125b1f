//! # CASTEP .cell 格式读写
//!
//! ## .cell 格式说明
//! ```text
//! %BLOCK LATTICE_CART
//! ang
//! a1 a2 a3
//! b1 b2 b3
//! c1 c2 c3
//! %ENDBLOCK LATTICE_CART
//!
//! %BLOCK POSITIONS_FRAC
//! Element x y z
//! ...
//! %ENDBLOCK POSITIONS_FRAC
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 和 `commands/primitive.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{XtalkitError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

const BOHR_TO_ANG: f64 = 0.529_177_210_903;

/// 解析 .cell 文件
pub fn parse_cell_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| XtalkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cell_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 .cell 格式
pub fn parse_cell_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    let lattice = if let Some(block) = find_block(&lines, "LATTICE_CART") {
        parse_lattice_cart(&block, default_name)?
    } else if let Some(block) = find_block(&lines, "LATTICE_ABC") {
        parse_lattice_abc(&block, default_name)?
    } else {
        return Err(cell_error(
            default_name,
            "Missing LATTICE_CART or LATTICE_ABC block",
        ));
    };

    let atoms = if let Some(block) = find_block(&lines, "POSITIONS_FRAC") {
        parse_positions(&block)
    } else if let Some(block) = find_block(&lines, "POSITIONS_ABS") {
        let scale = unit_scale(&block);
        parse_positions(&block)
            .into_iter()
            .map(|atom| -> Result<Atom> {
                let cart = atom.position.map(|x| x * scale);
                let frac = lattice.cart_to_frac(cart).ok_or_else(|| {
                    cell_error(default_name, "Singular lattice, cannot convert POSITIONS_ABS")
                })?;
                Ok(Atom::new(atom.element, frac))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };

    let mut crystal = Crystal::new(default_name, lattice, atoms);
    crystal.source_format = Some("cell".to_string());

    Ok(crystal)
}

fn cell_error(name: &str, reason: &str) -> XtalkitError {
    XtalkitError::ParseError {
        format: "cell".to_string(),
        path: name.to_string(),
        reason: reason.to_string(),
    }
}

/// 提取 %BLOCK NAME ... %ENDBLOCK NAME 之间的非注释行
fn find_block<'a>(lines: &[&'a str], block_name: &str) -> Option<Vec<&'a str>> {
    let start = lines.iter().position(|line| {
        let mut parts = line.split_whitespace();
        matches!(parts.next(), Some(tag) if tag.eq_ignore_ascii_case("%BLOCK"))
            && matches!(parts.next(), Some(name) if name.eq_ignore_ascii_case(block_name))
    })?;

    Some(
        lines[start + 1..]
            .iter()
            .map(|line| line.trim())
            .take_while(|line| !line.to_uppercase().starts_with("%ENDBLOCK"))
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .collect(),
    )
}

/// 单位行（ang / bohr / nm），返回换算到 Å 的系数
fn unit_scale(block: &[&str]) -> f64 {
    match block.first().map(|s| s.to_lowercase()) {
        Some(unit) if unit == "bohr" || unit == "a0" => BOHR_TO_ANG,
        Some(unit) if unit == "nm" => 10.0,
        _ => 1.0,
    }
}

fn is_unit_line(line: &str) -> bool {
    ["ang", "bohr", "a0", "nm"]
        .iter()
        .any(|unit| line.eq_ignore_ascii_case(unit))
}

/// 解析 LATTICE_CART 块
fn parse_lattice_cart(block: &[&str], name: &str) -> Result<Lattice> {
    let scale = unit_scale(block);
    let rows: Vec<[f64; 3]> = block
        .iter()
        .filter(|line| !is_unit_line(line))
        .filter_map(|line| {
            let parts: Vec<f64> = line
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            (parts.len() >= 3).then(|| [parts[0] * scale, parts[1] * scale, parts[2] * scale])
        })
        .take(3)
        .collect();

    if rows.len() < 3 {
        return Err(cell_error(name, "Incomplete LATTICE_CART block"));
    }

    Ok(Lattice::from_vectors([rows[0], rows[1], rows[2]]))
}

/// 解析 LATTICE_ABC 块
fn parse_lattice_abc(block: &[&str], name: &str) -> Result<Lattice> {
    let scale = unit_scale(block);
    let params: Vec<f64> = block
        .iter()
        .filter(|line| !is_unit_line(line))
        .flat_map(|line| line.split_whitespace())
        .filter_map(|s| s.parse().ok())
        .collect();

    if params.len() < 6 {
        return Err(cell_error(
            name,
            "Incomplete LATTICE_ABC block (need a b c alpha beta gamma)",
        ));
    }

    Ok(Lattice::from_parameters(
        params[0] * scale,
        params[1] * scale,
        params[2] * scale,
        params[3],
        params[4],
        params[5],
    ))
}

/// 解析原子位置块
fn parse_positions(block: &[&str]) -> Vec<Atom> {
    block
        .iter()
        .filter(|line| !is_unit_line(line))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            match (
                parts[1].parse::<f64>(),
                parts[2].parse::<f64>(),
                parts[3].parse::<f64>(),
            ) {
                (Ok(x), Ok(y), Ok(z)) => Some(Atom::new(parts[0], [x, y, z])),
                _ => None,
            }
        })
        .collect()
}

/// 将 Crystal 转换为 .cell 格式字符串
pub fn to_cell_string(crystal: &Crystal) -> String {
    let mut result = String::new();

    result.push_str("%BLOCK LATTICE_CART\nang\n");
    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "{:16.10} {:16.10} {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }
    result.push_str("%ENDBLOCK LATTICE_CART\n\n");

    result.push_str("%BLOCK POSITIONS_FRAC\n");
    for atom in &crystal.atoms {
        result.push_str(&format!(
            "{:4} {:16.10} {:16.10} {:16.10}\n",
            atom.element, atom.position[0], atom.position[1], atom.position[2]
        ));
    }
    result.push_str("%ENDBLOCK POSITIONS_FRAC\n");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_lattice_cart() {
        let content = r#"
%BLOCK LATTICE_CART
ang
5.0 0.0 0.0
0.0 5.0 0.0
0.0 0.0 5.0
%ENDBLOCK LATTICE_CART

%BLOCK POSITIONS_FRAC
Na 0.0 0.0 0.0
Cl 0.5 0.5 0.5
%ENDBLOCK POSITIONS_FRAC
"#;
        let crystal = parse_cell_content(content, "NaCl").unwrap();
        assert_eq!(crystal.atoms.len(), 2);
        assert!((crystal.volume() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_cell_lattice_abc_bohr() {
        let content = r#"
%block lattice_abc
bohr
10.0 10.0 10.0
90.0 90.0 90.0
%endblock lattice_abc
"#;
        let crystal = parse_cell_content(content, "box").unwrap();
        let (a, _, _, alpha, _, _) = crystal.lattice.parameters();

        assert!((a - 10.0 * BOHR_TO_ANG).abs() < 1e-9);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!(crystal.atoms.is_empty());
    }

    #[test]
    fn test_parse_cell_positions_abs() {
        let content = r#"
%BLOCK LATTICE_CART
4.0 0.0 0.0
0.0 4.0 0.0
0.0 0.0 4.0
%ENDBLOCK LATTICE_CART
%BLOCK POSITIONS_ABS
Si 2.0 1.0 0.0
%ENDBLOCK POSITIONS_ABS
"#;
        let crystal = parse_cell_content(content, "Si").unwrap();
        let p = crystal.atoms[0].position;
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!((p[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_lattice_block() {
        let content = "%BLOCK POSITIONS_FRAC\nFe 0 0 0\n%ENDBLOCK POSITIONS_FRAC\n";
        assert!(matches!(
            parse_cell_content(content, "Fe"),
            Err(XtalkitError::ParseError { .. })
        ));
    }

    #[test]
    fn test_cell_round_trip() {
        let lattice = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let atoms = vec![
            Atom::new("Si", [0.0, 0.0, 0.0]),
            Atom::new("Si", [0.25, 0.25, 0.25]),
        ];
        let crystal = Crystal::new("Si-diamond", lattice, atoms);

        let parsed = parse_cell_content(&to_cell_string(&crystal), "round_trip").unwrap();

        assert_eq!(parsed.atoms.len(), 2);
        assert!((parsed.atoms[1].position[0] - 0.25).abs() < 1e-6);
    }
}
