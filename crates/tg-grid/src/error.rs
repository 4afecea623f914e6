use thiserror::Error;

use crate::range::{Id2, Range2};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("invalid nd-range: {0}")]
    InvalidRange(String),
    #[error("global range {global} is not divisible by local range {local}")]
    NotDivisible { global: Range2, local: Range2 },
    #[error("work-group of {requested} work-items exceeds the device maximum of {max}")]
    GroupTooLarge { requested: usize, max: usize },
    #[error("local memory request of {requested} bytes exceeds the device capacity of {capacity} bytes")]
    LocalMemoryExceeded { requested: usize, capacity: usize },
    #[error("work-group {group} diverged at barrier phase {phase}: {retired} of {size} work-items retired while peers waited")]
    BarrierDivergence {
        group: Id2,
        phase: u64,
        retired: usize,
        size: usize,
    },
    #[error("local memory hazard in work-group {group}, buffer {buffer} cell ({row}, {col}): {kind}")]
    LocalMemoryHazard {
        group: Id2,
        buffer: usize,
        row: usize,
        col: usize,
        kind: String,
    },
    #[error("output element {index} written more than once")]
    DoubleWrite { index: usize },
    #[error("index ({row}, {col}) out of bounds for {what} of extent {extent}")]
    OutOfBounds {
        what: String,
        row: usize,
        col: usize,
        extent: Range2,
    },
    #[error("no local buffer {index}: {count} allocated")]
    NoSuchBuffer { index: usize, count: usize },
    #[error("work-item {global} panicked: {message}")]
    KernelPanic { global: Id2, message: String },
    #[error("kernel failed: {0}")]
    Kernel(String),
    #[error("failed to spawn compute unit thread: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
