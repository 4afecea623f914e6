use tracing::debug;

use tg_grid::{Element, Id2, LaunchStats, NdRange, Queue, Range2, WorkItem, WriteOnceBuffer};

use crate::error::{GemmError, Result};
use crate::matrix::Matrix;

/// Local buffer index of the A tile.
pub const TILE_A: usize = 0;
/// Local buffer index of the B tile.
pub const TILE_B: usize = 1;

/// Per-work-item body of the tiled GEMM.
///
/// The work-item owns output element `C[j][i]`, where `(j, i)` is its global
/// id, and slot `(lj, li)` of both group tiles. For every sweep step `kb` the
/// group loads one B x B tile of A and of B (one element each per
/// work-item), synchronizes, accumulates the tile's partial dot product, and
/// synchronizes again before the tiles are reused. Every work-item executes
/// the same barrier sequence regardless of its coordinates.
pub fn tile_kernel<T: Element>(
    item: &WorkItem<'_, T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &WriteOnceBuffer<T>,
) -> tg_grid::Result<()> {
    let n = item.global_range().cols;
    let tb = item.local_range().cols;
    let Id2 { row: j, col: i } = item.global_id();
    let Id2 { row: lj, col: li } = item.local_id();

    let a_tile = item.tile(TILE_A)?;
    let b_tile = item.tile(TILE_B)?;
    let a = a.as_slice();
    let b = b.as_slice();

    let mut acc = T::zero();
    for kb in 0..n / tb {
        a_tile.store(lj, li, a[j * n + kb * tb + li])?;
        b_tile.store(lj, li, b[(kb * tb + lj) * n + i])?;

        // Tiles fully populated before anyone reads them.
        item.barrier()?;

        for k in 0..tb {
            acc += a_tile.load(lj, k)? * b_tile.load(k, li)?;
        }

        // Everyone done reading before the next step overwrites.
        item.barrier()?;
    }

    c.write(Id2::new(j, i), acc)
}

/// Square matrix multiplication `C = A @ B` on a grid of `tile x tile`
/// work-groups.
#[derive(Debug, Clone)]
pub struct TiledGemm {
    queue: Queue,
    tile: usize,
}

impl TiledGemm {
    pub fn new(queue: Queue, tile: usize) -> Self {
        TiledGemm { queue, tile }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn tile(&self) -> usize {
        self.tile
    }

    /// Launch geometry for an `n x n` product.
    ///
    /// Fails if the tile size is zero or does not divide `n`; there is no
    /// partial tile handling.
    pub fn nd_range(&self, n: usize) -> Result<NdRange> {
        Ok(NdRange::new(Range2::square(n), Range2::square(self.tile))?)
    }

    pub fn multiply<T: Element>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.multiply_with_stats(a, b).map(|(c, _)| c)
    }

    /// Multiply and also return the launch summary.
    pub fn multiply_with_stats<T: Element>(
        &self,
        a: &Matrix<T>,
        b: &Matrix<T>,
    ) -> Result<(Matrix<T>, LaunchStats)> {
        let n = a.square_dim()?;
        let n_b = b.square_dim()?;
        if n != n_b {
            return Err(GemmError::DimensionMismatch {
                m: n,
                k: n,
                k2: n_b,
                n: n_b,
            });
        }

        let nd = self.nd_range(n)?;
        debug!(
            n,
            tile = self.tile,
            sweep_steps = n / self.tile,
            dtype = %T::DTYPE,
            "tiled gemm"
        );

        let tiles = [Range2::square(self.tile), Range2::square(self.tile)];
        let c = WriteOnceBuffer::new(nd.global());
        let stats = self
            .queue
            .launch::<T, _>(nd, &tiles, |item| tile_kernel(item, a, b, &c))?;
        debug_assert!(c.is_fully_written());

        Ok((Matrix::new(c.into_vec(), n, n)?, stats))
    }
}
