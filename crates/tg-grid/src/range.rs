use std::fmt;

use crate::error::{GridError, Result};

/// A 2-D extent. Dimension 0 is rows, dimension 1 is columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range2 {
    pub rows: usize,
    pub cols: usize,
}

impl Range2 {
    pub fn new(rows: usize, cols: usize) -> Self {
        Range2 { rows, cols }
    }

    /// A square `n x n` extent.
    pub fn square(n: usize) -> Self {
        Range2 { rows: n, cols: n }
    }

    /// Total number of points in the extent.
    pub fn count(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether `id` lies inside this extent.
    pub fn contains(&self, id: Id2) -> bool {
        id.row < self.rows && id.col < self.cols
    }

    /// Row-major linear offset of `id` inside this extent.
    pub fn linear(&self, id: Id2) -> usize {
        id.row * self.cols + id.col
    }
}

impl fmt::Display for Range2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.rows, self.cols)
    }
}

/// A 2-D coordinate inside a [`Range2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Id2 {
    pub row: usize,
    pub col: usize,
}

impl Id2 {
    pub fn new(row: usize, col: usize) -> Self {
        Id2 { row, col }
    }
}

impl fmt::Display for Id2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Global index space partitioned into equally sized work-groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    global: Range2,
    local: Range2,
}

impl NdRange {
    /// Build an nd-range, rejecting empty extents and a local extent that
    /// does not evenly divide the global one.
    pub fn new(global: Range2, local: Range2) -> Result<Self> {
        if global.count() == 0 {
            return Err(GridError::InvalidRange(format!(
                "global range {} is empty",
                global
            )));
        }
        if local.count() == 0 {
            return Err(GridError::InvalidRange(format!(
                "local range {} is empty",
                local
            )));
        }
        if global.rows % local.rows != 0 || global.cols % local.cols != 0 {
            return Err(GridError::NotDivisible { global, local });
        }
        Ok(NdRange { global, local })
    }

    /// A 1-D launch of `global` work-items in groups of `local`.
    pub fn linear(global: usize, local: usize) -> Result<Self> {
        Self::new(Range2::new(1, global), Range2::new(1, local))
    }

    pub fn global(&self) -> Range2 {
        self.global
    }

    pub fn local(&self) -> Range2 {
        self.local
    }

    /// Number of work-groups along each dimension.
    pub fn groups(&self) -> Range2 {
        Range2::new(
            self.global.rows / self.local.rows,
            self.global.cols / self.local.cols,
        )
    }

    /// Work-items per work-group.
    pub fn group_size(&self) -> usize {
        self.local.count()
    }
}
