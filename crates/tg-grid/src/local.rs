use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::Element;
use crate::error::{GridError, Result};
use crate::range::{Id2, Range2};

/// Stamp value for a cell that was never accessed. Real stamps are
/// `phase + 1`.
const NEVER: u64 = 0;

/// Unsynchronized local memory access detected by hazard tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    /// Read of a cell that no work-item of the current group has written.
    Uninitialized,
    /// Read of a cell written in the same barrier phase.
    ReadBeforeBarrier,
    /// Write to a cell already read in the same barrier phase.
    OverwriteBeforeBarrier,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hazard::Uninitialized => write!(f, "read before any write in this work-group"),
            Hazard::ReadBeforeBarrier => {
                write!(f, "read of a value written without an intervening barrier")
            }
            Hazard::OverwriteBeforeBarrier => {
                write!(f, "overwrite of a value read without an intervening barrier")
            }
        }
    }
}

#[derive(Debug, Default)]
struct CellStamps {
    written: AtomicU64,
    read: AtomicU64,
}

/// A fixed-size 2-D scratch region shared by the work-items of one group.
///
/// Cells hold raw element bits in relaxed atomics; visibility between
/// work-items comes from the group barrier, never from the cell itself.
#[derive(Debug)]
pub struct TileBuffer<T> {
    extent: Range2,
    cells: Vec<AtomicU64>,
    stamps: Option<Vec<CellStamps>>,
    _elem: PhantomData<fn() -> T>,
}

impl<T: Element> TileBuffer<T> {
    /// Allocate a zero-filled buffer. With `track_hazards` every access is
    /// stamped with the caller's barrier phase.
    pub fn new(extent: Range2, track_hazards: bool) -> Self {
        let n = extent.count();
        let zero = T::zero().to_bits64();
        TileBuffer {
            extent,
            cells: (0..n).map(|_| AtomicU64::new(zero)).collect(),
            stamps: track_hazards.then(|| (0..n).map(|_| CellStamps::default()).collect()),
            _elem: PhantomData,
        }
    }

    pub fn extent(&self) -> Range2 {
        self.extent
    }

    pub fn tracks_hazards(&self) -> bool {
        self.stamps.is_some()
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        let id = Id2::new(row, col);
        self.extent.contains(id).then(|| self.extent.linear(id))
    }

    fn check_store(&self, offset: usize, phase: u64) -> std::result::Result<(), Hazard> {
        if let Some(stamps) = &self.stamps {
            let s = &stamps[offset];
            s.written.store(phase + 1, Ordering::SeqCst);
            if s.read.load(Ordering::SeqCst) == phase + 1 {
                return Err(Hazard::OverwriteBeforeBarrier);
            }
        }
        Ok(())
    }

    fn check_load(
        &self,
        offset: usize,
        phase: u64,
        group_start: u64,
    ) -> std::result::Result<(), Hazard> {
        if let Some(stamps) = &self.stamps {
            let s = &stamps[offset];
            s.read.fetch_max(phase + 1, Ordering::SeqCst);
            let written = s.written.load(Ordering::SeqCst);
            if written == NEVER || written - 1 < group_start {
                return Err(Hazard::Uninitialized);
            }
            if written == phase + 1 {
                return Err(Hazard::ReadBeforeBarrier);
            }
        }
        Ok(())
    }
}

/// The set of local buffers bound to one compute unit.
#[derive(Debug)]
pub struct LocalMemory<T> {
    buffers: Vec<TileBuffer<T>>,
}

impl<T: Element> LocalMemory<T> {
    pub fn new(extents: &[Range2], track_hazards: bool) -> Self {
        LocalMemory {
            buffers: extents
                .iter()
                .map(|&e| TileBuffer::new(e, track_hazards))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&TileBuffer<T>> {
        self.buffers.get(index).ok_or(GridError::NoSuchBuffer {
            index,
            count: self.buffers.len(),
        })
    }
}

/// One work-item's view of a local buffer.
pub struct Tile<'a, T> {
    buffer: &'a TileBuffer<T>,
    index: usize,
    group: Id2,
    phase: &'a Cell<u64>,
    group_start: u64,
}

impl<'a, T: Element> Tile<'a, T> {
    pub(crate) fn new(
        buffer: &'a TileBuffer<T>,
        index: usize,
        group: Id2,
        phase: &'a Cell<u64>,
        group_start: u64,
    ) -> Self {
        Tile {
            buffer,
            index,
            group,
            phase,
            group_start,
        }
    }

    pub fn extent(&self) -> Range2 {
        self.buffer.extent
    }

    pub fn store(&self, row: usize, col: usize, value: T) -> Result<()> {
        let offset = self.offset(row, col)?;
        self.buffer
            .check_store(offset, self.phase.get())
            .map_err(|h| self.hazard(row, col, h))?;
        self.buffer.cells[offset].store(value.to_bits64(), Ordering::Relaxed);
        Ok(())
    }

    pub fn load(&self, row: usize, col: usize) -> Result<T> {
        let offset = self.offset(row, col)?;
        self.buffer
            .check_load(offset, self.phase.get(), self.group_start)
            .map_err(|h| self.hazard(row, col, h))?;
        Ok(T::from_bits64(self.buffer.cells[offset].load(Ordering::Relaxed)))
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize> {
        self.buffer
            .offset(row, col)
            .ok_or_else(|| GridError::OutOfBounds {
                what: format!("local buffer {}", self.index),
                row,
                col,
                extent: self.buffer.extent,
            })
    }

    fn hazard(&self, row: usize, col: usize, hazard: Hazard) -> GridError {
        GridError::LocalMemoryHazard {
            group: self.group,
            buffer: self.index,
            row,
            col,
            kind: hazard.to_string(),
        }
    }
}
