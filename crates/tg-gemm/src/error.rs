use thiserror::Error;

use tg_grid::GridError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GemmError {
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    DimensionMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("data length {len} does not match {rows}x{cols}")]
    LengthMismatch { len: usize, rows: usize, cols: usize },
}

pub type Result<T> = std::result::Result<T, GemmError>;
