use crate::error::FifoError;
use crate::record::{HEADER_SIZE, RESERVE_OVERHEAD};

/// Smallest accepted ring capacity in bytes.
pub const MIN_CAPACITY: usize = 16;

/// Default ring capacity (64 KiB).
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Configuration for a command FIFO.
#[derive(Debug, Clone)]
pub struct FifoConfig {
    /// Usable ring size in bytes. Must be a multiple of 4 and at least
    /// [`MIN_CAPACITY`]; the backing buffer is 4 bytes larger.
    pub capacity: usize,
    /// Name used in log output (e.g. "to-core", "to-client").
    pub label: String,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            label: "fifo".to_string(),
        }
    }
}

impl FifoConfig {
    /// Config with the given capacity and the default label.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Replace the log label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Check the capacity constraints.
    pub fn validate(&self) -> Result<(), FifoError> {
        if self.capacity < MIN_CAPACITY {
            return Err(FifoError::InvalidConfig(format!(
                "capacity {} is below the minimum of {} bytes",
                self.capacity, MIN_CAPACITY
            )));
        }
        if self.capacity % HEADER_SIZE != 0 {
            return Err(FifoError::InvalidConfig(format!(
                "capacity {} is not a multiple of {}",
                self.capacity, HEADER_SIZE
            )));
        }
        Ok(())
    }

    /// Largest payload a single reservation can request.
    pub fn max_payload(&self) -> usize {
        max_payload_for(self.capacity)
    }
}

/// Largest payload that fits a ring of `capacity` bytes (and a `u16` length).
pub(crate) fn max_payload_for(capacity: usize) -> usize {
    // needed = size + overhead must not exceed end = capacity - 1
    capacity
        .saturating_sub(1 + RESERVE_OVERHEAD)
        .min(u16::MAX as usize)
}
