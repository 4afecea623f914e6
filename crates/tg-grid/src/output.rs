use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::element::Element;
use crate::error::{GridError, Result};
use crate::range::{Id2, Range2};

/// Device-visible output where every element may be written at most once.
///
/// Work-items write disjoint elements without locking. A second write to
/// the same element is rejected, so a launch whose index arithmetic maps
/// two work-items onto one cell fails instead of silently racing.
#[derive(Debug)]
pub struct WriteOnceBuffer<T> {
    extent: Range2,
    values: Vec<AtomicU64>,
    written: Vec<AtomicBool>,
    _elem: PhantomData<fn() -> T>,
}

impl<T: Element> WriteOnceBuffer<T> {
    /// Allocate an unwritten buffer. Unwritten elements read back as zero.
    pub fn new(extent: Range2) -> Self {
        let n = extent.count();
        let zero = T::zero().to_bits64();
        WriteOnceBuffer {
            extent,
            values: (0..n).map(|_| AtomicU64::new(zero)).collect(),
            written: (0..n).map(|_| AtomicBool::new(false)).collect(),
            _elem: PhantomData,
        }
    }

    pub fn extent(&self) -> Range2 {
        self.extent
    }

    /// Commit `value` at `id`.
    pub fn write(&self, id: Id2, value: T) -> Result<()> {
        if !self.extent.contains(id) {
            return Err(GridError::OutOfBounds {
                what: "output buffer".to_string(),
                row: id.row,
                col: id.col,
                extent: self.extent,
            });
        }
        let index = self.extent.linear(id);
        if self.written[index].swap(true, Ordering::AcqRel) {
            return Err(GridError::DoubleWrite { index });
        }
        self.values[index].store(value.to_bits64(), Ordering::Release);
        Ok(())
    }

    /// Value at `id`, or `None` if it was never written.
    pub fn get(&self, id: Id2) -> Option<T> {
        if !self.extent.contains(id) {
            return None;
        }
        let index = self.extent.linear(id);
        self.written[index]
            .load(Ordering::Acquire)
            .then(|| T::from_bits64(self.values[index].load(Ordering::Acquire)))
    }

    /// Number of elements written so far.
    pub fn write_count(&self) -> usize {
        self.written
            .iter()
            .filter(|w| w.load(Ordering::Acquire))
            .count()
    }

    pub fn is_fully_written(&self) -> bool {
        self.write_count() == self.extent.count()
    }

    /// Transfer back to host memory, row-major.
    pub fn into_vec(self) -> Vec<T> {
        self.values
            .into_iter()
            .map(|v| T::from_bits64(v.into_inner()))
            .collect()
    }
}
