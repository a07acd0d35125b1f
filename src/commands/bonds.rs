//! # bonds 命令实现
//!
//! 重建距离、键角、键矢量三张查找表，并打印 (i, j, k) 正反两个方向的查询结果。
//!
//! ## 依赖关系
//! - 使用 `cli/bonds.rs` 定义的参数
//! - 使用 `bonds/` 构建查找表
//! - 使用 `utils/progress.rs`

use crate::bonds::table::{KeyPath, RelationTable};
use crate::bonds::{
    build_angle_dict, build_distance_dict, build_vector_dict, AngleTable, DistanceTable,
    DuplicatePolicy, VectorTable,
};
use crate::cli::bonds::BondsArgs;
use crate::error::Result;
use crate::utils::progress;
use std::path::Path;

/// 执行 bonds 命令
pub fn execute(args: BondsArgs) -> Result<()> {
    println!("Loading data for {} from {}", args.name, args.dir.display());

    let policy = if args.strict {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::Overwrite
    };

    let spinner = progress::create_spinner("Building lookup tables...");
    let (distances, angles, vectors) = match load_tables(&args.name, &args.dir, policy) {
        Ok(tables) => tables,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    // spinner 画在 stderr，不影响下面的固定格式输出
    spinner.finish_with_message(format!(
        "Loaded {}, {}, {}",
        table_size(&distances),
        table_size(&angles),
        table_size(&vectors)
    ));

    for line in report(&distances, &angles, &vectors, args.i, args.j, args.k)? {
        println!("{}", line);
    }

    if args.neighbors {
        for line in neighbor_lines(&distances, args.i) {
            println!("{}", line);
        }
    }

    Ok(())
}

fn table_size<K: KeyPath, V>(table: &RelationTable<K, V>) -> String {
    if table.is_empty() {
        format!("no {} entries", table.relation())
    } else {
        format!("{} {} entries", table.len(), table.relation())
    }
}

fn load_tables(
    name: &str,
    dir: &Path,
    policy: DuplicatePolicy,
) -> Result<(DistanceTable, AngleTable, VectorTable)> {
    Ok((
        build_distance_dict(name, dir, policy)?,
        build_angle_dict(name, dir, policy)?,
        build_vector_dict(name, dir, policy)?,
    ))
}

/// 演示输出的四行，缺失的键直接报错
fn report(
    distances: &DistanceTable,
    angles: &AngleTable,
    vectors: &VectorTable,
    i: usize,
    j: usize,
    k: usize,
) -> Result<Vec<String>> {
    Ok(vec![
        format!("i = {}, j = {}, k = {}", i, j, k),
        format!(
            "Distance ij and distance ji:  {:?} {:?}",
            distances.lookup((i, j))?,
            distances.lookup((j, i))?
        ),
        format!(
            "Angle ijk and angle kji:  {:?} {:?}",
            angles.lookup((i, j, k))?,
            angles.lookup((k, j, i))?
        ),
        format!(
            "Vector ij and vector ji:  {} {}",
            format_vector(vectors.lookup((i, j))?),
            format_vector(vectors.lookup((j, i))?)
        ),
    ])
}

/// 源原子为 `i` 的全部键长，按邻居编号排序
fn neighbor_lines(distances: &DistanceTable, i: usize) -> Vec<String> {
    let mut partners: Vec<(usize, f64)> = distances
        .partners(i)
        .map(|(&(_, j), &d)| (j, d))
        .collect();
    partners.sort_by_key(|&(j, _)| j);

    let mut lines = vec![format!("Neighbors of {}:  {}", i, partners.len())];
    lines.extend(partners.into_iter().map(|(j, d)| format!("  {} -> {}:  {:?}", i, j, d)));
    lines
}

/// 浮点数统一带小数点输出（`1.0` 而非 `1`）
fn format_vector(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{:?}", x)).collect();
    format!("[{}]", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonds::builders::{angle_from_arrays, distance_from_arrays, vector_from_arrays};
    use crate::error::XtalkitError;

    fn tables() -> (DistanceTable, AngleTable, VectorTable) {
        let policy = DuplicatePolicy::Overwrite;
        (
            distance_from_arrays(&[148, 62], &[62, 148], &[1.5, 1.5], policy).unwrap(),
            angle_from_arrays(&[148, 78], &[62, 62], &[78, 148], &[109.5, 109.5], policy)
                .unwrap(),
            vector_from_arrays(
                &[148, 62],
                &[62, 148],
                vec![vec![1.0, 0.5, 0.0], vec![-1.0, -0.5, 0.0]],
                policy,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_report_lines() {
        let (d, a, v) = tables();
        let lines = report(&d, &a, &v, 148, 62, 78).unwrap();

        assert_eq!(
            lines,
            vec![
                "i = 148, j = 62, k = 78",
                "Distance ij and distance ji:  1.5 1.5",
                "Angle ijk and angle kji:  109.5 109.5",
                "Vector ij and vector ji:  [1.0 0.5 0.0] [-1.0 -0.5 0.0]",
            ]
        );
    }

    #[test]
    fn test_report_missing_key() {
        let (d, a, v) = tables();
        let err = report(&d, &a, &v, 148, 62, 5).unwrap_err();
        assert!(matches!(err, XtalkitError::KeyNotFound { .. }));
    }

    #[test]
    fn test_neighbor_lines_sorted() {
        let distances = distance_from_arrays(
            &[148, 148, 62, 148],
            &[90, 62, 148, 7],
            &[2.1, 1.5, 1.5, 1.9],
            DuplicatePolicy::Overwrite,
        )
        .unwrap();

        assert_eq!(
            neighbor_lines(&distances, 148),
            vec![
                "Neighbors of 148:  3",
                "  148 -> 7:  1.9",
                "  148 -> 62:  1.5",
                "  148 -> 90:  2.1",
            ]
        );
        assert_eq!(neighbor_lines(&distances, 5), vec!["Neighbors of 5:  0"]);
    }

    #[test]
    fn test_table_size() {
        let (d, _, _) = tables();
        assert_eq!(table_size(&d), "2 distance entries");

        let empty = distance_from_arrays(&[], &[], &[], DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(table_size(&empty), "no distance entries");
    }

    #[test]
    fn test_whole_values_keep_decimal_point() {
        let policy = DuplicatePolicy::Overwrite;
        let d = distance_from_arrays(&[1, 2], &[2, 1], &[2.0, 2.0], policy).unwrap();
        let a = angle_from_arrays(&[1, 3], &[2, 2], &[3, 1], &[90.0, 90.0], policy).unwrap();
        let v = vector_from_arrays(
            &[1, 2],
            &[2, 1],
            vec![vec![1.0, 0.0, 0.0], vec![-1.0, 0.0, 0.0]],
            policy,
        )
        .unwrap();

        let lines = report(&d, &a, &v, 1, 2, 3).unwrap();
        assert_eq!(lines[1], "Distance ij and distance ji:  2.0 2.0");
        assert_eq!(lines[2], "Angle ijk and angle kji:  90.0 90.0");
        assert_eq!(lines[3], "Vector ij and vector ji:  [1.0 0.0 0.0] [-1.0 0.0 0.0]");
        assert_eq!(neighbor_lines(&d, 1)[1], "  1 -> 2:  2.0");
    }

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&[]), "[]");
        assert_eq!(format_vector(&[0.25, -3.0]), "[0.25 -3.0]");
    }
}
