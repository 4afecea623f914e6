//! `tg-grid` - Work-group execution substrate for tiled-gemm.
//!
//! This crate provides:
//! - `NdRange`: a 2-D global index space split into equally sized work-groups
//! - `Queue`: launches a kernel body once per global index, on teams of
//!   threads that each execute one work-group at a time
//! - `WorkItem`: per-invocation coordinates, the group barrier and local memory
//! - `GroupBarrier`: a reusable atomic barrier that detects divergent arrival
//! - `TileBuffer`/`LocalMemory`: group-private scratch with optional hazard
//!   tracking
//! - `WriteOnceBuffer`: output memory with single-writer enforcement
//! - `DeviceConfig`: device limits checked before every launch

pub mod barrier;
pub mod device;
pub mod element;
pub mod error;
pub mod item;
pub mod local;
pub mod output;
pub mod queue;
pub mod range;

// Re-export primary types at the crate root for convenience.
pub use barrier::{Arrival, Divergence, GroupBarrier};
pub use device::DeviceConfig;
pub use element::{DType, Element};
pub use error::{GridError, Result};
pub use item::WorkItem;
pub use local::{Hazard, LocalMemory, Tile, TileBuffer};
pub use output::WriteOnceBuffer;
pub use queue::{LaunchStats, Queue};
pub use range::{Id2, NdRange, Range2};
