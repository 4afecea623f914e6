use std::thread;

use crate::element::DType;
use crate::error::{GridError, Result};
use crate::range::{NdRange, Range2};

/// Limits and execution knobs of the simulated device.
///
/// A launch is checked against these limits before any work-item runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Human-readable device name, reported by the CLI.
    pub name: String,
    /// Maximum number of work-items in one work-group.
    pub max_work_group_size: usize,
    /// Local (work-group shared) memory capacity in bytes.
    pub local_mem_bytes: usize,
    /// Number of work-groups that may execute at the same time. Each
    /// compute unit owns one team of work-item threads.
    pub compute_units: usize,
    /// Stack size of every work-item thread.
    pub work_item_stack_bytes: usize,
    /// Track barrier phases on every local memory access and fail the launch
    /// on an unsynchronized read or overwrite.
    pub check_hazards: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            name: "cpu".to_string(),
            max_work_group_size: 1024,
            local_mem_bytes: 64 * 1024,
            compute_units: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            work_item_stack_bytes: 256 * 1024,
            check_hazards: false,
        }
    }
}

impl DeviceConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_work_group_size(mut self, n: usize) -> Self {
        self.max_work_group_size = n;
        self
    }

    pub fn with_local_mem_bytes(mut self, bytes: usize) -> Self {
        self.local_mem_bytes = bytes;
        self
    }

    /// Set the compute unit count. Zero is clamped to one.
    pub fn with_compute_units(mut self, n: usize) -> Self {
        self.compute_units = n.max(1);
        self
    }

    pub fn with_work_item_stack_bytes(mut self, bytes: usize) -> Self {
        self.work_item_stack_bytes = bytes;
        self
    }

    pub fn with_hazard_checks(mut self, enabled: bool) -> Self {
        self.check_hazards = enabled;
        self
    }

    /// Bytes of local memory needed for `buffers` of `dtype` elements.
    pub fn local_bytes(buffers: &[Range2], dtype: DType) -> usize {
        buffers.iter().map(|r| r.count()).sum::<usize>() * dtype.size_in_bytes()
    }

    /// Check that a launch fits this device.
    pub fn validate(&self, nd: &NdRange, buffers: &[Range2], dtype: DType) -> Result<()> {
        let requested = nd.group_size();
        if requested > self.max_work_group_size {
            return Err(GridError::GroupTooLarge {
                requested,
                max: self.max_work_group_size,
            });
        }
        if let Some(empty) = buffers.iter().find(|r| r.count() == 0) {
            return Err(GridError::InvalidRange(format!(
                "local buffer {} is empty",
                empty
            )));
        }
        let requested = Self::local_bytes(buffers, dtype);
        if requested > self.local_mem_bytes {
            return Err(GridError::LocalMemoryExceeded {
                requested,
                capacity: self.local_mem_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nd(n: usize, b: usize) -> NdRange {
        NdRange::new(Range2::square(n), Range2::square(b)).unwrap()
    }

    #[test]
    fn test_default_limits() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.max_work_group_size, 1024);
        assert_eq!(cfg.local_mem_bytes, 64 * 1024);
        assert!(cfg.compute_units >= 1);
        assert!(!cfg.check_hazards);
    }

    #[test]
    fn test_builders() {
        let cfg = DeviceConfig::default()
            .with_name("test")
            .with_compute_units(0)
            .with_work_item_stack_bytes(64 * 1024)
            .with_hazard_checks(true);
        assert_eq!(cfg.name, "test");
        assert_eq!(cfg.compute_units, 1);
        assert_eq!(cfg.work_item_stack_bytes, 64 * 1024);
        assert!(cfg.check_hazards);
    }

    #[test]
    fn test_validate_ok() {
        let cfg = DeviceConfig::default();
        let tiles = [Range2::square(4), Range2::square(4)];
        assert!(cfg.validate(&nd(1024, 4), &tiles, DType::F32).is_ok());
    }

    #[test]
    fn test_group_too_large() {
        let cfg = DeviceConfig::default().with_max_work_group_size(64);
        let err = cfg.validate(&nd(64, 16), &[], DType::F32).unwrap_err();
        assert_eq!(err, GridError::GroupTooLarge { requested: 256, max: 64 });
    }

    #[test]
    fn test_local_memory_exceeded() {
        let cfg = DeviceConfig::default().with_local_mem_bytes(1024);
        let tiles = [Range2::square(16), Range2::square(16)];
        let err = cfg.validate(&nd(64, 16), &tiles, DType::F64).unwrap_err();
        assert_eq!(
            err,
            GridError::LocalMemoryExceeded {
                requested: 4096,
                capacity: 1024
            }
        );
    }

    #[test]
    fn test_local_bytes() {
        let tiles = [Range2::square(4), Range2::new(2, 3)];
        assert_eq!(DeviceConfig::local_bytes(&tiles, DType::F32), 88);
    }
}
