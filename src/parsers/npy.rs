//! # NumPy .npy 数组读取
//!
//! 只读取单个数组的 `.npy` 文件（`numpy.save` 的输出），不处理 `.npz` 和对象数组。
//!
//! ## 文件布局
//! ```text
//! \x93NUMPY <major> <minor> <header_len: u16 (v1) | u32 (v2, v3)>
//! {'descr': '<i8', 'fortran_order': False, 'shape': (123,), }   (padding to 64 bytes)
//! <raw element bytes>
//! ```
//!
//! ## 依赖关系
//! - 被 `bonds/builders.rs` 使用
//! - 使用 `regex` 解析头部字典

use crate::error::{XtalkitError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";

/// 元素数据，整数统一为 i64，浮点统一为 f64
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

/// 解码后的数组
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub data: NpyData,
    /// 来源路径，用于错误信息
    pub origin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Signed,
    Unsigned,
    Float,
}

#[derive(Debug, Clone, Copy)]
struct Dtype {
    kind: Kind,
    size: usize,
    big_endian: bool,
}

fn npy_error(origin: &str, reason: impl Into<String>) -> XtalkitError {
    XtalkitError::NpyError {
        path: origin.to_string(),
        reason: reason.into(),
    }
}

/// 读取 .npy 文件
pub fn read_npy_file(path: &Path) -> Result<NpyArray> {
    if !path.exists() {
        return Err(XtalkitError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let bytes = fs::read(path).map_err(|e| XtalkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_npy_bytes(&bytes, &path.display().to_string())
}

/// 从内存字节解析 .npy
pub fn parse_npy_bytes(bytes: &[u8], origin: &str) -> Result<NpyArray> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(npy_error(origin, "Missing \\x93NUMPY magic string"));
    }

    let major = bytes[6];
    let minor = bytes[7];
    let (header_len, header_start) = match major {
        1 => {
            let raw = bytes
                .get(8..10)
                .ok_or_else(|| npy_error(origin, "Truncated header length"))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = bytes
                .get(8..12)
                .ok_or_else(|| npy_error(origin, "Truncated header length"))?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                12,
            )
        }
        _ => {
            return Err(npy_error(
                origin,
                format!("Unsupported format version {}.{}", major, minor),
            ))
        }
    };

    let header_end = header_start + header_len;
    let header = bytes
        .get(header_start..header_end)
        .ok_or_else(|| npy_error(origin, "Truncated header"))?;
    let header = std::str::from_utf8(header).map_err(|_| npy_error(origin, "Header is not text"))?;

    let (dtype, fortran_order, shape) = parse_header(header, origin)?;

    let needed = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .and_then(|count| count.checked_mul(dtype.size))
        .ok_or_else(|| npy_error(origin, format!("Shape {:?} overflows", shape)))?;
    let payload = &bytes[header_end..];
    if payload.len() < needed {
        return Err(npy_error(
            origin,
            format!(
                "Expected {} data bytes for shape {:?}, found {}",
                needed,
                shape,
                payload.len()
            ),
        ));
    }

    let data = decode(&payload[..needed], dtype, origin)?;

    Ok(NpyArray {
        shape,
        fortran_order,
        data,
        origin: origin.to_string(),
    })
}

fn parse_header(header: &str, origin: &str) -> Result<(Dtype, bool, Vec<usize>)> {
    let descr_re = Regex::new(r"'descr'\s*:\s*'([^']*)'").expect("valid regex");
    let fortran_re = Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("valid regex");
    let shape_re = Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("valid regex");

    let descr = descr_re
        .captures(header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| npy_error(origin, "Header has no 'descr'"))?;
    let fortran_order = fortran_re
        .captures(header)
        .map(|c| &c[1] == "True")
        .ok_or_else(|| npy_error(origin, "Header has no 'fortran_order'"))?;
    let shape_text = shape_re
        .captures(header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| npy_error(origin, "Header has no 'shape'"))?;

    let shape = shape_text
        .split(',')
        .map(|s| s.trim().trim_end_matches('L'))
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| npy_error(origin, format!("Invalid dimension '{}'", s)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((parse_descr(&descr, origin)?, fortran_order, shape))
}

fn parse_descr(descr: &str, origin: &str) -> Result<Dtype> {
    let unsupported = || npy_error(origin, format!("Unsupported dtype '{}'", descr));

    let mut chars = descr.chars();
    let order = chars.next().ok_or_else(unsupported)?;
    let kind = match chars.next() {
        Some('i') => Kind::Signed,
        Some('u') | Some('b') => Kind::Unsigned,
        Some('f') => Kind::Float,
        _ => return Err(unsupported()),
    };
    let size: usize = chars.as_str().parse().map_err(|_| unsupported())?;

    let big_endian = match order {
        '<' | '|' => false,
        '>' => true,
        '=' => cfg!(target_endian = "big"),
        _ => return Err(unsupported()),
    };

    let valid = match kind {
        Kind::Signed | Kind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        Kind::Float => matches!(size, 4 | 8),
    };
    if !valid {
        return Err(unsupported());
    }

    Ok(Dtype {
        kind,
        size,
        big_endian,
    })
}

fn decode(payload: &[u8], dtype: Dtype, origin: &str) -> Result<NpyData> {
    let words = payload.chunks_exact(dtype.size).map(|chunk| {
        let mut buf = [0u8; 8];
        if dtype.big_endian {
            buf[8 - dtype.size..].copy_from_slice(chunk);
            u64::from_be_bytes(buf)
        } else {
            buf[..dtype.size].copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        }
    });

    let bits = (dtype.size * 8) as u32;
    match dtype.kind {
        Kind::Float if dtype.size == 4 => Ok(NpyData::Float(
            words.map(|w| f32::from_bits(w as u32) as f64).collect(),
        )),
        Kind::Float => Ok(NpyData::Float(words.map(f64::from_bits).collect())),
        Kind::Signed => Ok(NpyData::Int(
            words
                .map(|w| {
                    // 符号扩展
                    let shift = 64 - bits;
                    ((w << shift) as i64) >> shift
                })
                .collect(),
        )),
        Kind::Unsigned => words
            .map(|w| {
                i64::try_from(w).map_err(|_| npy_error(origin, format!("Value {} overflows i64", w)))
            })
            .collect::<Result<Vec<_>>>()
            .map(NpyData::Int),
    }
}

impl NpyArray {
    fn require_ndim(&self, ndim: usize) -> Result<()> {
        if self.shape.len() != ndim {
            return Err(npy_error(
                &self.origin,
                format!("Expected a {}-D array, found shape {:?}", ndim, self.shape),
            ));
        }
        Ok(())
    }

    fn values_f64(&self) -> Vec<f64> {
        match &self.data {
            NpyData::Int(v) => v.iter().map(|&x| x as f64).collect(),
            NpyData::Float(v) => v.clone(),
        }
    }

    /// 一维原子索引数组；浮点值必须为非负整数
    pub fn to_indices(&self) -> Result<Vec<usize>> {
        self.require_ndim(1)?;
        let bad = |what: String| npy_error(&self.origin, format!("Invalid atom index {}", what));

        match &self.data {
            NpyData::Int(v) => v
                .iter()
                .map(|&x| usize::try_from(x).map_err(|_| bad(x.to_string())))
                .collect(),
            NpyData::Float(v) => v
                .iter()
                .map(|&x| {
                    if x.is_finite() && x >= 0.0 && x.fract() == 0.0 {
                        Ok(x as usize)
                    } else {
                        Err(bad(x.to_string()))
                    }
                })
                .collect(),
        }
    }

    /// 一维数值数组
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        self.require_ndim(1)?;
        Ok(self.values_f64())
    }

    /// 二维矩阵的列，`columns()[n]` 为 `M[:, n]`
    pub fn columns(&self) -> Result<Vec<Vec<f64>>> {
        self.require_ndim(2)?;
        let (rows, cols) = (self.shape[0], self.shape[1]);
        let values = self.values_f64();

        Ok((0..cols)
            .map(|c| {
                (0..rows)
                    .map(|r| {
                        if self.fortran_order {
                            values[c * rows + r]
                        } else {
                            values[r * cols + c]
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// 测试用：按 numpy.save 的布局（版本 1.0）序列化
#[cfg(test)]
pub(crate) fn encode_npy(descr: &str, fortran_order: bool, shape: &[usize], payload: &[u8]) -> Vec<u8> {
    encode_npy_version(1, descr, fortran_order, shape, payload)
}

/// 测试用：指定主版本号，2.0/3.0 的头部长度为 u32
#[cfg(test)]
pub(crate) fn encode_npy_version(
    major: u8,
    descr: &str,
    fortran_order: bool,
    shape: &[usize],
    payload: &[u8],
) -> Vec<u8> {
    let len_size = if major == 1 { 2 } else { 4 };
    let shape_text = match shape {
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
        descr,
        if fortran_order { "True" } else { "False" },
        shape_text
    );
    while (MAGIC.len() + 2 + len_size + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&[major, 0]);
    if major == 1 {
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    } else {
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    }
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

#[cfg(test)]
pub(crate) fn i64_payload(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
pub(crate) fn f64_payload(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int64_vector() {
        let bytes = encode_npy("<i8", false, &[3], &i64_payload(&[148, 62, 0]));
        let array = parse_npy_bytes(&bytes, "I.npy").unwrap();

        assert_eq!(array.shape, vec![3]);
        assert_eq!(array.to_indices().unwrap(), vec![148, 62, 0]);
    }

    #[test]
    fn test_parse_float_vector_and_empty() {
        let bytes = encode_npy("<f8", false, &[2], &f64_payload(&[3.5, 109.5]));
        assert_eq!(
            parse_npy_bytes(&bytes, "d.npy").unwrap().to_f64_vec().unwrap(),
            vec![3.5, 109.5]
        );

        let empty = encode_npy("<f8", false, &[0], &[]);
        let array = parse_npy_bytes(&empty, "e.npy").unwrap();
        assert_eq!(array.shape, vec![0]);
        assert!(array.to_f64_vec().unwrap().is_empty());
    }

    #[test]
    fn test_small_and_big_endian_dtypes() {
        let int32: Vec<u8> = [-1i32, 7].iter().flat_map(|v| v.to_le_bytes()).collect();
        let array = parse_npy_bytes(&encode_npy("<i4", false, &[2], &int32), "i4").unwrap();
        assert_eq!(array.data, NpyData::Int(vec![-1, 7]));

        let big: Vec<u8> = [300u16, 2].iter().flat_map(|v| v.to_be_bytes()).collect();
        let array = parse_npy_bytes(&encode_npy(">u2", false, &[2], &big), "u2").unwrap();
        assert_eq!(array.to_indices().unwrap(), vec![300, 2]);

        let f32s: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let array = parse_npy_bytes(&encode_npy("<f4", false, &[2], &f32s), "f4").unwrap();
        assert_eq!(array.to_f64_vec().unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_matrix_columns_c_and_fortran_order() {
        // V = [[1, 2], [3, 4], [5, 6]]，列为 [1,3,5] 与 [2,4,6]
        let c_order = encode_npy("<f8", false, &[3, 2], &f64_payload(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let f_order = encode_npy("<f8", true, &[3, 2], &f64_payload(&[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]));

        for bytes in [c_order, f_order] {
            let columns = parse_npy_bytes(&bytes, "V.npy").unwrap().columns().unwrap();
            assert_eq!(columns, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        }
    }

    #[test]
    fn test_float_indices_must_be_whole() {
        let ok = encode_npy("<f8", false, &[2], &f64_payload(&[4.0, 5.0]));
        assert_eq!(parse_npy_bytes(&ok, "I").unwrap().to_indices().unwrap(), vec![4, 5]);

        let bad = encode_npy("<f8", false, &[1], &f64_payload(&[4.5]));
        assert!(parse_npy_bytes(&bad, "I").unwrap().to_indices().is_err());

        let negative = encode_npy("<i8", false, &[1], &i64_payload(&[-3]));
        assert!(matches!(
            parse_npy_bytes(&negative, "I").unwrap().to_indices(),
            Err(XtalkitError::NpyError { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(parse_npy_bytes(b"not an npy file", "x").is_err());

        let truncated = encode_npy("<i8", false, &[4], &i64_payload(&[1, 2]));
        assert!(parse_npy_bytes(&truncated, "x").is_err());

        let objects = encode_npy("|O", false, &[1], &[0; 8]);
        assert!(parse_npy_bytes(&objects, "x").is_err());

        let matrix = encode_npy("<i8", false, &[1, 1], &i64_payload(&[1]));
        assert!(parse_npy_bytes(&matrix, "x").unwrap().to_indices().is_err());
    }

    #[test]
    fn test_format_versions() {
        for major in [2, 3] {
            let bytes = encode_npy_version(major, "<i8", false, &[2], &i64_payload(&[148, 62]));
            let array = parse_npy_bytes(&bytes, "I.npy").unwrap();
            assert_eq!(array.to_indices().unwrap(), vec![148, 62]);
        }

        let future = encode_npy_version(4, "<i8", false, &[1], &i64_payload(&[1]));
        let err = parse_npy_bytes(&future, "I.npy").unwrap_err();
        assert!(matches!(err, XtalkitError::NpyError { ref reason, .. } if reason.contains("4.0")));
    }

    #[test]
    fn test_shape_overflow_is_an_error() {
        let long = encode_npy("<i8", false, &[1 << 62], &[]);
        assert!(matches!(
            parse_npy_bytes(&long, "I.npy"),
            Err(XtalkitError::NpyError { .. })
        ));

        let wide = encode_npy("<f8", false, &[1 << 40, 1 << 40], &[]);
        assert!(matches!(
            parse_npy_bytes(&wide, "V.npy"),
            Err(XtalkitError::NpyError { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = read_npy_file(Path::new("/nonexistent/dir/x_euc.npy")).unwrap_err();
        assert!(matches!(err, XtalkitError::FileNotFound { .. }));
    }
}
