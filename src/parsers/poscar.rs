//! # VASP POSCAR 格式读写
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor (negative = target volume)
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 和 `commands/primitive.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{XtalkitError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| XtalkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn poscar_error(name: &str, reason: impl Into<String>) -> XtalkitError {
    XtalkitError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(poscar_error(default_name, "File too short"));
    }

    let name = match lines[0].trim() {
        "" => default_name.to_string(),
        title => title.to_string(),
    };

    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| poscar_error(&name, "Invalid scaling factor on line 2"))?;

    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(poscar_error(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0], parts[1], parts[2]];
    }

    // 负的缩放因子表示目标体积
    let factor = if scale < 0.0 {
        let raw = Lattice::from_vectors(matrix).volume().abs();
        (scale.abs() / raw).cbrt()
    } else {
        scale
    };
    let lattice = Lattice::from_vectors(matrix.map(|row| row.map(|x| x * factor)));

    // 第 6 行：VASP 5+ 为元素符号，VASP 4 直接为原子数
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    let (elements, counts, mut coord_line) =
        if line5_parts.first().map_or(false, |s| s.parse::<usize>().is_ok()) {
            let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
            let elements: Vec<String> = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect();
            (elements, counts, 6)
        } else {
            let elements: Vec<String> = line5_parts
                .iter()
                .map(|s| s.split('/').next().unwrap_or(s).to_string())
                .collect();
            let counts: Vec<usize> = lines[6]
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            (elements, counts, 7)
        };

    if lines
        .get(coord_line)
        .map_or(false, |l| l.trim().to_lowercase().starts_with('s'))
    {
        coord_line += 1;
    }

    let coord_type = lines
        .get(coord_line)
        .ok_or_else(|| poscar_error(&name, "Missing coordinate type line"))?
        .trim()
        .to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    let mut atoms: Vec<Atom> = Vec::new();
    let mut position_lines = lines[coord_line + 1..].iter();

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let line = position_lines.next().ok_or_else(|| {
                poscar_error(&name, format!("Expected {} positions", counts.iter().sum::<usize>()))
            })?;
            let parts: Vec<f64> = line
                .split_whitespace()
                .take(3)
                .filter_map(|s| s.parse().ok())
                .collect();
            if parts.len() < 3 {
                return Err(poscar_error(&name, format!("Invalid position line '{}'", line.trim())));
            }

            let position = if is_cartesian {
                let cart = [parts[0], parts[1], parts[2]].map(|x| x * factor);
                lattice
                    .cart_to_frac(cart)
                    .ok_or_else(|| poscar_error(&name, "Singular lattice"))?
            } else {
                [parts[0], parts[1], parts[2]]
            };
            atoms.push(Atom::new(elem.clone(), position));
        }
    }

    let mut crystal = Crystal::new(name, lattice, atoms);
    crystal.source_format = Some("poscar".to_string());

    Ok(crystal)
}

/// 将 Crystal 转换为 POSCAR 格式字符串（按元素首次出现顺序分组）
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let mut groups: Vec<(&str, Vec<[f64; 3]>)> = Vec::new();
    for atom in &crystal.atoms {
        match groups.iter_mut().find(|(el, _)| *el == atom.element) {
            Some((_, positions)) => positions.push(atom.position),
            None => groups.push((atom.element.as_str(), vec![atom.position])),
        }
    }

    let mut result = String::new();
    result.push_str(&format!("{}\n", crystal.name));
    result.push_str("1.0\n");

    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    let symbols: Vec<&str> = groups.iter().map(|(el, _)| *el).collect();
    let counts: Vec<String> = groups.iter().map(|(_, p)| p.len().to_string()).collect();
    result.push_str(&format!("   {}\n", symbols.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));
    result.push_str("Direct\n");

    for (_, positions) in &groups {
        for pos in positions {
            result.push_str(&format!(
                "  {:16.10}  {:16.10}  {:16.10}\n",
                pos[0], pos[1], pos[2]
            ));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "NaCl").unwrap();
        assert_eq!(crystal.name, "NaCl");
        assert_eq!(crystal.atoms.len(), 8);
        assert_eq!(crystal.atoms.iter().filter(|a| a.element == "Cl").count(), 4);
    }

    #[test]
    fn test_parse_poscar_negative_scale_is_volume() {
        let content = "box\n-64.0\n1 0 0\n0 1 0\n0 0 1\nC\n1\nDirect\n0 0 0\n";
        let crystal = parse_poscar_content(content, "box").unwrap();
        assert!((crystal.volume() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_cartesian_selective() {
        let content = r#"Fe
2.0
1.5 0.0 0.0
0.0 1.5 0.0
0.0 0.0 1.5
Fe
2
Selective dynamics
Cartesian
0.0 0.0 0.0 T T T
0.75 0.75 0.75 F F F
"#;
        let crystal = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(crystal.atoms.len(), 2);
        // 0.75 * 2.0 / 3.0
        assert!((crystal.atoms[1].position[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_truncated_positions() {
        let content = "Si\n1.0\n4 0 0\n0 4 0\n0 0 4\nSi\n3\nDirect\n0 0 0\n0.5 0.5 0.5\n";
        assert!(parse_poscar_content(content, "Si").is_err());
    }

    #[test]
    fn test_poscar_round_trip() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("Ti", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.0]),
            Atom::new("O", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("TiO2", lattice, atoms);

        let parsed = parse_poscar_content(&to_poscar_string(&crystal), "round_trip").unwrap();

        assert_eq!(parsed.atoms.len(), 3);
        assert_eq!(parsed.atoms[0].element, "Ti");
        assert_eq!(parsed.atoms.iter().filter(|a| a.element == "O").count(), 2);
    }
}
