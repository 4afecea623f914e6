use std::cell::Cell;

use crate::barrier::GroupBarrier;
use crate::element::Element;
use crate::error::{GridError, Result};
use crate::local::{LocalMemory, Tile};
use crate::range::{Id2, NdRange, Range2};

/// Execution context of one work-item.
///
/// Handed to the kernel body once per global index. Exposes the item's
/// global, local and group coordinates, the group barrier, and the group's
/// local buffers.
pub struct WorkItem<'a, T> {
    nd: NdRange,
    group: Id2,
    local: Id2,
    barrier: &'a GroupBarrier,
    memory: &'a LocalMemory<T>,
    phase: Cell<u64>,
    group_start: u64,
}

impl<'a, T: Element> WorkItem<'a, T> {
    pub(crate) fn new(
        nd: NdRange,
        group: Id2,
        local: Id2,
        barrier: &'a GroupBarrier,
        memory: &'a LocalMemory<T>,
        phase: u64,
    ) -> Self {
        WorkItem {
            nd,
            group,
            local,
            barrier,
            memory,
            phase: Cell::new(phase),
            group_start: phase,
        }
    }

    /// Coordinates in the global index space.
    pub fn global_id(&self) -> Id2 {
        let l = self.nd.local();
        Id2::new(
            self.group.row * l.rows + self.local.row,
            self.group.col * l.cols + self.local.col,
        )
    }

    /// Coordinates inside the work-group.
    pub fn local_id(&self) -> Id2 {
        self.local
    }

    pub fn group_id(&self) -> Id2 {
        self.group
    }

    pub fn global_range(&self) -> Range2 {
        self.nd.global()
    }

    pub fn local_range(&self) -> Range2 {
        self.nd.local()
    }

    pub fn group_range(&self) -> Range2 {
        self.nd.groups()
    }

    pub fn global_linear_id(&self) -> usize {
        self.nd.global().linear(self.global_id())
    }

    pub fn local_linear_id(&self) -> usize {
        self.nd.local().linear(self.local)
    }

    /// Barrier phase this work-item is currently in.
    pub fn phase(&self) -> u64 {
        self.phase.get()
    }

    /// Group-scope barrier with a local memory fence.
    ///
    /// Every work-item of the group must call this the same number of times;
    /// a group whose members disagree fails with
    /// [`GridError::BarrierDivergence`].
    pub fn barrier(&self) -> Result<()> {
        match self.barrier.wait() {
            Ok(phase) => {
                self.phase.set(phase);
                Ok(())
            }
            Err(d) => Err(GridError::BarrierDivergence {
                group: self.group,
                phase: d.phase,
                retired: d.retired,
                size: self.barrier.size(),
            }),
        }
    }

    /// Local buffer `index`, in the order the launch requested them.
    pub fn tile(&self, index: usize) -> Result<Tile<'_, T>> {
        let buffer = self.memory.get(index)?;
        Ok(Tile::new(
            buffer,
            index,
            self.group,
            &self.phase,
            self.group_start,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates() {
        let nd = NdRange::new(Range2::square(8), Range2::new(2, 4)).unwrap();
        let barrier = GroupBarrier::new(8);
        let memory = LocalMemory::<f32>::new(&[], false);
        let item = WorkItem::new(nd, Id2::new(3, 1), Id2::new(1, 2), &barrier, &memory, 0);

        assert_eq!(item.global_id(), Id2::new(7, 6));
        assert_eq!(item.local_id(), Id2::new(1, 2));
        assert_eq!(item.group_id(), Id2::new(3, 1));
        assert_eq!(item.group_range(), Range2::new(4, 2));
        assert_eq!(item.global_linear_id(), 62);
        assert_eq!(item.local_linear_id(), 6);
    }

    #[test]
    fn test_single_item_barrier_advances_phase() {
        let nd = NdRange::new(Range2::square(1), Range2::square(1)).unwrap();
        let barrier = GroupBarrier::new(1);
        let memory = LocalMemory::<f32>::new(&[Range2::square(1)], true);
        let item = WorkItem::new(nd, Id2::default(), Id2::default(), &barrier, &memory, 0);

        let tile = item.tile(0).unwrap();
        tile.store(0, 0, 3.0).unwrap();
        assert!(tile.load(0, 0).is_err());
        item.barrier().unwrap();
        assert_eq!(item.phase(), 1);
        assert_eq!(tile.load(0, 0).unwrap(), 3.0);
        assert!(item.tile(1).is_err());
    }
}
