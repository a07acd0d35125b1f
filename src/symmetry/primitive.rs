//! # 原胞约化
//!
//! 将 `Crystal` 交给 `moyo` 做对称性搜索，取其标准化原胞 (`prim_std_cell`)
//! 再转换回 `Crystal`。
//!
//! ## 依赖关系
//! - 被 `commands/primitive.rs` 使用
//! - 使用 `moyo`、`nalgebra`

use crate::error::{XtalkitError, Result};
use crate::models::{wrap_fractional, Atom, Crystal, Lattice};
use moyo::base::{AngleTolerance, Cell, Lattice as MoyoLattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::Vector3;

/// 对称性搜索参数
#[derive(Debug, Clone, Copy)]
pub struct SymmetryOptions {
    /// 长度容差 (Å)
    pub symprec: f64,
    /// 角度容差（度），`None` 时使用 moyo 默认值
    pub angle_tolerance: Option<f64>,
}

impl Default for SymmetryOptions {
    fn default() -> Self {
        SymmetryOptions {
            symprec: 1e-3,
            angle_tolerance: None,
        }
    }
}

/// 约化结果
#[derive(Debug, Clone)]
pub struct Reduction {
    pub primitive: Crystal,
    /// 国际表空间群号
    pub space_group_number: i32,
    /// 输入晶胞相对原胞的倍数
    pub multiplicity: usize,
}

/// 将元素符号映射为 moyo 的整数种类编号（从 1 开始）
fn species_numbers(crystal: &Crystal) -> (Vec<String>, Vec<i32>) {
    let mut species: Vec<String> = Vec::new();
    let numbers = crystal
        .atoms
        .iter()
        .map(|atom| {
            let index = match species.iter().position(|s| *s == atom.element) {
                Some(index) => index,
                None => {
                    species.push(atom.element.clone());
                    species.len() - 1
                }
            };
            index as i32 + 1
        })
        .collect();

    (species, numbers)
}

/// 计算原胞
pub fn primitive_cell(crystal: &Crystal, options: &SymmetryOptions) -> Result<Reduction> {
    if crystal.atoms.is_empty() {
        return Err(XtalkitError::SymmetryError(format!(
            "Structure '{}' has no atoms",
            crystal.name
        )));
    }
    if crystal.lattice.volume().abs() < 1e-8 {
        return Err(XtalkitError::SymmetryError(format!(
            "Structure '{}' has a singular lattice",
            crystal.name
        )));
    }

    let (species, numbers) = species_numbers(crystal);
    let positions = crystal
        .atoms
        .iter()
        .map(|atom| Vector3::new(atom.position[0], atom.position[1], atom.position[2]))
        .collect();
    let cell = Cell::new(MoyoLattice::new(crystal.lattice.to_matrix()), positions, numbers);

    let angle_tolerance = match options.angle_tolerance {
        Some(degrees) => AngleTolerance::Radian(degrees.to_radians()),
        None => AngleTolerance::Default,
    };

    let dataset = MoyoDataset::new(&cell, options.symprec, angle_tolerance, Setting::Spglib, false)
        .map_err(|e| XtalkitError::SymmetryError(format!("{:?}", e)))?;

    let prim = &dataset.prim_std_cell;
    // moyo 的 basis 以列存放晶格矢量
    let lattice = Lattice::from_matrix(&prim.lattice.basis.transpose());

    let atoms = prim
        .positions
        .iter()
        .zip(&prim.numbers)
        .map(|(pos, &number)| -> Result<Atom> {
            let element = usize::try_from(number - 1)
                .ok()
                .and_then(|i| species.get(i))
                .cloned()
                .ok_or_else(|| {
                    XtalkitError::SymmetryError(format!("Unknown species number {}", number))
                })?;
            Ok(Atom::new(element, [pos.x, pos.y, pos.z].map(wrap_fractional)))
        })
        .collect::<Result<Vec<_>>>()?;

    let multiplicity = crystal.atoms.len() / atoms.len().max(1);

    let mut primitive = Crystal::new(crystal.name.clone(), lattice, atoms);
    primitive.space_group = Some(dataset.number.to_string());
    primitive.source_format = crystal.source_format.clone();

    Ok(Reduction {
        primitive,
        space_group_number: dataset.number,
        multiplicity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64, element: &str, positions: &[[f64; 3]]) -> Crystal {
        let atoms = positions.iter().map(|p| Atom::new(element, *p)).collect();
        Crystal::new("test", Lattice::from_parameters(a, a, a, 90.0, 90.0, 90.0), atoms)
    }

    #[test]
    fn test_fcc_conventional_to_primitive() {
        let cu = cubic(
            3.615,
            "Cu",
            &[
                [0.0, 0.0, 0.0],
                [0.0, 0.5, 0.5],
                [0.5, 0.0, 0.5],
                [0.5, 0.5, 0.0],
            ],
        );

        let reduction = primitive_cell(&cu, &SymmetryOptions::default()).unwrap();

        assert_eq!(reduction.primitive.atoms.len(), 1);
        assert_eq!(reduction.multiplicity, 4);
        assert_eq!(reduction.space_group_number, 225);
        assert!((reduction.primitive.volume() - cu.volume() / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_bcc_conventional_to_primitive() {
        let fe = cubic(2.87, "Fe", &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);

        let reduction = primitive_cell(&fe, &SymmetryOptions::default()).unwrap();

        assert_eq!(reduction.primitive.atoms.len(), 1);
        assert_eq!(reduction.space_group_number, 229);
        assert!((reduction.primitive.volume() - fe.volume() / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rocksalt_keeps_both_species() {
        let lattice = Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0);
        let mut atoms = Vec::new();
        for t in [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]] {
            atoms.push(Atom::new("Na", t));
            atoms.push(Atom::new("Cl", [t[0] + 0.5, t[1], t[2]].map(|x| x % 1.0)));
        }
        let nacl = Crystal::new("NaCl", lattice, atoms);

        let reduction = primitive_cell(&nacl, &SymmetryOptions::default()).unwrap();
        let prim = &reduction.primitive;

        assert_eq!(prim.atoms.len(), 2);
        assert_eq!(prim.formula(), "ClNa");
        assert!((prim.volume() - nacl.volume() / 4.0).abs() < 1e-6);
        assert!(prim
            .atoms
            .iter()
            .all(|a| a.position.iter().all(|&x| (0.0..1.0).contains(&x))));
    }

    #[test]
    fn test_primitive_input_is_unchanged_in_size() {
        let po = cubic(3.35, "Po", &[[0.0, 0.0, 0.0]]);
        let reduction = primitive_cell(&po, &SymmetryOptions::default()).unwrap();

        assert_eq!(reduction.multiplicity, 1);
        assert!((reduction.primitive.volume() - po.volume()).abs() < 1e-6);
    }

    #[test]
    fn test_empty_structure_is_rejected() {
        let empty = cubic(3.0, "X", &[]);
        assert!(matches!(
            primitive_cell(&empty, &SymmetryOptions::default()),
            Err(XtalkitError::SymmetryError(_))
        ));
    }
}
