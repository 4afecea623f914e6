use std::fmt::Debug;

use tg_grid::Element;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::reference::reference_product;
use crate::tiled::TiledGemm;

/// Trait for interchangeable matrix multiplication implementations, so the
/// same verification harness can drive any of them.
pub trait GemmBackend<T: Element>: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "serial", "tiled").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    fn gemm(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>>;
}

/// Single-threaded triple loop. The reference every other backend is
/// checked against.
#[derive(Debug, Clone, Default)]
pub struct SerialBackend;

impl SerialBackend {
    pub fn new() -> Self {
        SerialBackend
    }
}

impl<T: Element> GemmBackend<T> for SerialBackend {
    fn name(&self) -> &str {
        "serial"
    }

    fn gemm(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        reference_product(a, b)
    }
}

impl<T: Element> GemmBackend<T> for TiledGemm {
    fn name(&self) -> &str {
        "tiled"
    }

    fn gemm(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.multiply(a, b)
    }
}
