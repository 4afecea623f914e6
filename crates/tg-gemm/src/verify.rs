use std::fmt;

use tracing::{info, warn};

use tg_grid::Element;

use crate::error::{GemmError, Result};
use crate::matrix::Matrix;
use crate::reference::reference_product;

/// Acceptance threshold for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Maximum `|expected - actual| / |expected|` for a non-zero reference.
    pub relative: f64,
    /// Maximum `|expected - actual|` when the reference is zero.
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            relative: 1e-6,
            absolute: 1e-8,
        }
    }
}

impl Tolerance {
    /// Non-finite values match only their own kind: NaN matches NaN, an
    /// infinity matches the infinity of the same sign.
    pub fn accepts(&self, expected: f64, actual: f64) -> bool {
        if expected.is_nan() || actual.is_nan() {
            return expected.is_nan() && actual.is_nan();
        }
        if expected.is_infinite() || actual.is_infinite() {
            return expected == actual;
        }
        let diff = (expected - actual).abs();
        if expected == 0.0 {
            diff <= self.absolute
        } else {
            diff / expected.abs() <= self.relative
        }
    }
}

/// An output element outside tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch<T> {
    pub row: usize,
    pub col: usize,
    pub expected: T,
    pub actual: T,
}

/// Outcome of a verification pass: every mismatch, not just the first.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport<T> {
    pub rows: usize,
    pub cols: usize,
    pub checked: usize,
    pub tolerance: Tolerance,
    pub mismatches: Vec<Mismatch<T>>,
}

impl<T> VerifyReport<T> {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl<T: fmt::Display> fmt::Display for VerifyReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.mismatches {
            writeln!(
                f,
                "fail - element [{}, {}]: expected {}, got {}",
                m.row, m.col, m.expected, m.actual
            )?;
        }
        if self.passed() {
            write!(f, "SUCCESS - all {} elements match", self.checked)
        } else {
            write!(
                f,
                "FAILURE - {} of {} elements mismatch",
                self.mismatches.len(),
                self.checked
            )
        }
    }
}

/// Checks a product against an independently computed serial reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier {
    tolerance: Tolerance,
}

impl Verifier {
    pub fn new(tolerance: Tolerance) -> Self {
        Verifier { tolerance }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Verify that `c` is `a @ b`.
    pub fn verify<T: Element>(
        &self,
        a: &Matrix<T>,
        b: &Matrix<T>,
        c: &Matrix<T>,
    ) -> Result<VerifyReport<T>> {
        let expected = reference_product(a, b)?;
        self.compare(&expected, c)
    }

    /// Element-wise comparison of two products of the same shape.
    pub fn compare<T: Element>(
        &self,
        expected: &Matrix<T>,
        actual: &Matrix<T>,
    ) -> Result<VerifyReport<T>> {
        if expected.dims() != actual.dims() {
            return Err(GemmError::DimensionMismatch {
                m: expected.rows(),
                k: expected.cols(),
                k2: actual.rows(),
                n: actual.cols(),
            });
        }

        let (rows, cols) = (expected.rows(), expected.cols());
        let mut mismatches = Vec::new();
        for row in 0..rows {
            let e_row = expected.row(row);
            let a_row = actual.row(row);
            for col in 0..cols {
                let (e, a) = (e_row[col], a_row[col]);
                if !self.tolerance.accepts(e.to_f64(), a.to_f64()) {
                    mismatches.push(Mismatch {
                        row,
                        col,
                        expected: e,
                        actual: a,
                    });
                }
            }
        }

        let report = VerifyReport {
            rows,
            cols,
            checked: rows * cols,
            tolerance: self.tolerance,
            mismatches,
        };
        if report.passed() {
            info!(rows, cols, "verification passed");
        } else {
            warn!(
                rows,
                cols,
                mismatches = report.mismatches.len(),
                "verification failed"
            );
        }
        Ok(report)
    }
}
