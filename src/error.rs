//! # 统一错误处理模块
//!
//! 定义 xtalkit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// xtalkit 统一错误类型
#[derive(Error, Debug)]
pub enum XtalkitError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid .npy array {path}: {reason}")]
    NpyError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 键值表错误
    // ─────────────────────────────────────────────────────────────
    #[error("Length mismatch in {relation} arrays: '{field}' has {found} rows, expected {expected}")]
    LengthMismatch {
        relation: String,
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate {relation} key {key} at row {row}")]
    DuplicateKey {
        relation: String,
        key: String,
        row: usize,
    },

    #[error("No {relation} entry for key {key}")]
    KeyNotFound { relation: String, key: String },

    // ─────────────────────────────────────────────────────────────
    // 对称性错误
    // ─────────────────────────────────────────────────────────────
    #[error("Symmetry search failed: {0}")]
    SymmetryError(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // JSON 错误
    // ─────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, XtalkitError>;
