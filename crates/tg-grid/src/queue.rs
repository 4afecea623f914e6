use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::barrier::GroupBarrier;
use crate::device::DeviceConfig;
use crate::element::Element;
use crate::error::{GridError, Result};
use crate::item::WorkItem;
use crate::local::LocalMemory;
use crate::range::{Id2, NdRange, Range2};

/// Summary of a completed launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchStats {
    pub work_groups: usize,
    pub work_items: usize,
    /// Compute units that actually received work.
    pub compute_units: usize,
    /// Work-groups dealt to each compute unit.
    pub groups_per_unit: Vec<usize>,
    /// Barrier phases completed by each compute unit, including the implicit
    /// retire barrier after every work-group.
    pub barrier_phases: Vec<u64>,
    pub elapsed: Duration,
}

/// Submits nd-range kernels to the simulated device.
///
/// Every compute unit owns a team of `group_size` threads, one barrier and
/// one set of local buffers. Work-groups are dealt to compute units
/// round-robin; a unit runs its groups one after another, and groups on
/// different units run concurrently. [`Queue::launch`] returns after every
/// thread has joined, so all writes of the kernel are visible to the caller.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    device: DeviceConfig,
}

impl Queue {
    pub fn new(device: DeviceConfig) -> Self {
        Queue { device }
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Run `kernel` once per global index of `nd`.
    ///
    /// `local` lists the local buffers each work-group gets, reachable from
    /// the kernel through [`WorkItem::tile`] in the same order. The launch is
    /// validated against the device before any thread starts.
    pub fn launch<T, F>(&self, nd: NdRange, local: &[Range2], kernel: F) -> Result<LaunchStats>
    where
        T: Element,
        F: Fn(&WorkItem<'_, T>) -> Result<()> + Sync,
    {
        self.device.validate(&nd, local, T::DTYPE)?;

        let start = Instant::now();
        let groups = nd.groups();
        let n_groups = groups.count();
        let units = self.device.compute_units.clamp(1, n_groups);
        let group_size = nd.group_size();

        debug!(
            global = %nd.global(),
            local = %nd.local(),
            work_groups = n_groups,
            compute_units = units,
            local_bytes = DeviceConfig::local_bytes(local, T::DTYPE),
            "launching nd-range kernel"
        );

        let groups_per_unit: Vec<usize> = (0..units)
            .map(|unit| (unit..n_groups).step_by(units).len())
            .collect();

        let errors = ErrorSlot::default();
        let units_state: Vec<(GroupBarrier, LocalMemory<T>)> = (0..units)
            .map(|_| {
                (
                    GroupBarrier::new(group_size),
                    LocalMemory::new(local, self.device.check_hazards),
                )
            })
            .collect();

        thread::scope(|s| {
            for (unit, (barrier, memory)) in units_state.iter().enumerate() {
                debug!(
                    unit,
                    work_groups = groups_per_unit[unit],
                    work_items = group_size,
                    "dispatching compute unit"
                );
                for lid in 0..group_size {
                    let local_id = Id2::new(lid / nd.local().cols, lid % nd.local().cols);
                    let kernel = &kernel;
                    let errors = &errors;
                    let spawned = thread::Builder::new()
                        .name(format!("cu{}-wi{}", unit, lid))
                        .stack_size(self.device.work_item_stack_bytes)
                        .spawn_scoped(s, move || {
                            run_work_item(
                                nd, unit, units, local_id, barrier, memory, kernel, errors,
                            )
                        });
                    if let Err(e) = spawned {
                        // Threads already started would wait forever for the
                        // missing peers.
                        barrier.abort();
                        errors.record(GridError::Spawn(e.to_string()));
                        break;
                    }
                }
            }
        });

        if let Some(err) = errors.take() {
            return Err(err);
        }

        let stats = LaunchStats {
            work_groups: n_groups,
            work_items: nd.global().count(),
            compute_units: units,
            groups_per_unit,
            barrier_phases: units_state.iter().map(|(b, _)| b.phase()).collect(),
            elapsed: start.elapsed(),
        };
        debug!(elapsed_us = stats.elapsed.as_micros() as u64, "nd-range kernel complete");
        Ok(stats)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_work_item<T, F>(
    nd: NdRange,
    unit: usize,
    units: usize,
    local_id: Id2,
    barrier: &GroupBarrier,
    memory: &LocalMemory<T>,
    kernel: &F,
    errors: &ErrorSlot,
) where
    T: Element,
    F: Fn(&WorkItem<'_, T>) -> Result<()> + Sync,
{
    let groups = nd.groups();
    let mut phase = 0u64;

    for g in (unit..groups.count()).step_by(units) {
        let group = Id2::new(g / groups.cols, g % groups.cols);
        let item = WorkItem::new(nd, group, local_id, barrier, memory, phase);

        match panic::catch_unwind(AssertUnwindSafe(|| kernel(&item))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.record(e),
            Err(payload) => errors.record(GridError::KernelPanic {
                global: item.global_id(),
                message: panic_message(payload.as_ref()),
            }),
        }

        match barrier.retire() {
            Ok(next) => phase = next,
            Err(d) => {
                errors.record(GridError::BarrierDivergence {
                    group,
                    phase: d.phase,
                    retired: d.retired,
                    size: barrier.size(),
                });
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// First error of a launch. A divergence is usually the echo of another
/// work-item failing early, so any other error takes precedence.
#[derive(Default)]
struct ErrorSlot {
    cause: Mutex<Option<GridError>>,
    divergence: Mutex<Option<GridError>>,
}

impl ErrorSlot {
    fn record(&self, err: GridError) {
        let slot = match err {
            GridError::BarrierDivergence { .. } => &self.divergence,
            _ => &self.cause,
        };
        let mut slot = slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<GridError> {
        let cause = self.cause.lock().unwrap_or_else(|p| p.into_inner()).take();
        cause.or_else(|| {
            self.divergence
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .take()
        })
    }
}
