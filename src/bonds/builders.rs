//! # 查找表构建
//!
//! 从 `{name}_{relation}_{field}.npy` 并列数组重建距离、键角和键矢量表。
//!
//! | 关系     | 文件后缀                                                | 键         |
//! |----------|---------------------------------------------------------|------------|
//! | distance | `edges_src`, `edges_dst`, `euc`                         | `(i, j)`   |
//! | angle    | `angles_I`, `angles_J`, `angles_K`, `angles_theta`      | `(i, j, k)`|
//! | vector   | `vectors_I`, `vectors_J`, `vectors_V` (V 的第 n 列)     | `(i, j)`   |
//!
//! ## 依赖关系
//! - 被 `commands/bonds.rs` 使用
//! - 使用 `parsers/npy.rs` 读取数组

use super::table::{AngleTable, DistanceTable, DuplicatePolicy, RelationTable, VectorTable};
use crate::error::{XtalkitError, Result};
use crate::parsers::npy::{read_npy_file, NpyArray};
use std::path::{Path, PathBuf};

/// `{dir}/{name}_{suffix}.npy`；晶体名可能含 `.`，不能用 `with_extension`
pub fn array_path(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}_{}.npy", name, suffix))
}

fn load(dir: &Path, name: &str, suffix: &str) -> Result<NpyArray> {
    read_npy_file(&array_path(dir, name, suffix))
}

fn check_len(relation: &str, field: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(XtalkitError::LengthMismatch {
            relation: relation.to_string(),
            field: field.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

pub fn build_distance_dict(
    name: &str,
    dir: &Path,
    policy: DuplicatePolicy,
) -> Result<DistanceTable> {
    let src = load(dir, name, "edges_src")?.to_indices()?;
    let dst = load(dir, name, "edges_dst")?.to_indices()?;
    let euc = load(dir, name, "euc")?.to_f64_vec()?;

    distance_from_arrays(&src, &dst, &euc, policy)
}

pub fn distance_from_arrays(
    src: &[usize],
    dst: &[usize],
    euc: &[f64],
    policy: DuplicatePolicy,
) -> Result<DistanceTable> {
    check_len("distance", "edges_dst", src.len(), dst.len())?;
    check_len("distance", "euc", src.len(), euc.len())?;

    let rows = src
        .iter()
        .zip(dst)
        .zip(euc)
        .map(|((&i, &j), &d)| ((i, j), d));
    RelationTable::from_rows("distance", rows, policy)
}

pub fn build_angle_dict(name: &str, dir: &Path, policy: DuplicatePolicy) -> Result<AngleTable> {
    let i = load(dir, name, "angles_I")?.to_indices()?;
    let j = load(dir, name, "angles_J")?.to_indices()?;
    let k = load(dir, name, "angles_K")?.to_indices()?;
    let theta = load(dir, name, "angles_theta")?.to_f64_vec()?;

    angle_from_arrays(&i, &j, &k, &theta, policy)
}

pub fn angle_from_arrays(
    i: &[usize],
    j: &[usize],
    k: &[usize],
    theta: &[f64],
    policy: DuplicatePolicy,
) -> Result<AngleTable> {
    check_len("angle", "angles_J", i.len(), j.len())?;
    check_len("angle", "angles_K", i.len(), k.len())?;
    check_len("angle", "angles_theta", i.len(), theta.len())?;

    let rows = (0..i.len()).map(|n| ((i[n], j[n], k[n]), theta[n]));
    RelationTable::from_rows("angle", rows, policy)
}

pub fn build_vector_dict(
    name: &str,
    dir: &Path,
    policy: DuplicatePolicy,
) -> Result<VectorTable> {
    let i = load(dir, name, "vectors_I")?.to_indices()?;
    let j = load(dir, name, "vectors_J")?.to_indices()?;
    let v = load(dir, name, "vectors_V")?.columns()?;

    vector_from_arrays(&i, &j, v, policy)
}

/// `columns[n]` 为矩阵 V 的第 n 列
pub fn vector_from_arrays(
    i: &[usize],
    j: &[usize],
    columns: Vec<Vec<f64>>,
    policy: DuplicatePolicy,
) -> Result<VectorTable> {
    check_len("vector", "vectors_J", i.len(), j.len())?;
    check_len("vector", "vectors_V columns", i.len(), columns.len())?;

    let rows = i.iter().zip(j).zip(columns).map(|((&a, &b), v)| ((a, b), v));
    RelationTable::from_rows("vector", rows, policy)
}
