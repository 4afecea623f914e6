//! `tg-gemm` - Tiled dense matrix multiplication on work-group grids.
//!
//! This crate provides:
//! - A row-major `Matrix` type with seeded random construction
//! - `tile_kernel`, the per-work-item body of the local-memory tiled GEMM
//! - `TiledGemm`, which validates and launches that kernel over an N x N grid
//! - A serial reference product and the `GemmBackend` trait over both
//! - A `Verifier` that reports every element outside tolerance

pub mod backend;
pub mod error;
pub mod matrix;
pub mod reference;
pub mod tiled;
pub mod verify;

// Re-export primary types at the crate root for convenience.
pub use backend::{GemmBackend, SerialBackend};
pub use error::{GemmError, Result};
pub use matrix::Matrix;
pub use reference::{reference_product, serial_gemm};
pub use tiled::{tile_kernel, TiledGemm, TILE_A, TILE_B};
pub use verify::{Mismatch, Tolerance, Verifier, VerifyReport};
