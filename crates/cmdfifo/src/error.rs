/// Errors that can occur while creating a command FIFO.
#[derive(Debug, thiserror::Error)]
pub enum FifoError {
    /// The ring buffer storage could not be allocated.
    #[error("FIFO allocation failure ({bytes} bytes)")]
    Allocation { bytes: usize },

    /// The configuration was rejected (capacity too small or misaligned).
    #[error("Invalid FIFO configuration: {0}")]
    InvalidConfig(String),
}

/// Why a non-blocking send did not queue its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrySendError {
    /// Not enough free space without waiting for the consumer.
    #[error("FIFO is full")]
    Full,

    /// The FIFO has been shut down and accepts no new work.
    #[error("FIFO is shut down")]
    Closed,
}

/// Errors returned by the copy-out receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The FIFO has been shut down.
    #[error("FIFO is shut down")]
    Closed,

    /// The caller's buffer cannot hold the next record; it stays queued.
    #[error("receive buffer too small: record needs {needed} bytes")]
    BufferTooSmall { needed: usize },
}
