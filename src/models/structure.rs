//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示，可以从不同格式解析并写出为不同格式，
//! 也是对称性约化的输入与输出。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `symmetry/` 使用
//! - 使用 `nalgebra` 做坐标变换

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 行向量形式的 nalgebra 矩阵
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let m = self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    /// 从行向量形式的 nalgebra 矩阵创建
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Lattice {
            matrix: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
        }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let m = self.to_matrix();
        let a_vec: Vector3<f64> = m.row(0).transpose();
        let b_vec: Vector3<f64> = m.row(1).transpose();
        let c_vec: Vector3<f64> = m.row(2).transpose();

        let (a, b, c) = (a_vec.norm(), b_vec.norm(), c_vec.norm());

        let alpha = (b_vec.dot(&c_vec) / (b * c)).acos().to_degrees();
        let beta = (a_vec.dot(&c_vec) / (a * c)).acos().to_degrees();
        let gamma = (a_vec.dot(&b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，左手系为负）
    pub fn volume(&self) -> f64 {
        self.to_matrix().determinant()
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let cart = self.to_matrix().transpose() * Vector3::new(frac[0], frac[1], frac[2]);
        [cart.x, cart.y, cart.z]
    }

    /// 笛卡尔坐标转分数坐标，晶格奇异时返回 `None`
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let inv = self.to_matrix().transpose().try_inverse()?;
        let frac = inv * Vector3::new(cart[0], cart[1], cart[2]);
        Some([frac.x, frac.y, frac.z])
    }
}

/// 将分数坐标折回 [0, 1)
pub fn wrap_fractional(x: f64) -> f64 {
    let w = x.rem_euclid(1.0);
    if w >= 1.0 - 1e-12 {
        0.0
    } else {
        w
    }
}

/// 原子信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],

    /// 可选：原子标签（用于区分同种元素的不同位置）
    pub label: Option<String>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// 晶体结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 空间群
    pub space_group: Option<String>,

    /// 来源文件格式
    pub source_format: Option<String>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
            space_group: None,
            source_format: None,
        }
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 晶胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        self.lattice.volume().abs()
    }
}
