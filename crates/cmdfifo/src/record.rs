//! In-buffer record layout.
//!
//! ```text
//! +---------+---------+----------------------+---------+
//! | command | length  | payload (length B)   | padding |
//! |  u16 LE |  u16 LE |                      | to 4 B  |
//! +---------+---------+----------------------+---------+
//! ```
//!
//! A header with `command == 0` is the wrap sentinel: the reader continues
//! from the start of the buffer.

/// Size of the record header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Bytes a reservation needs on top of its payload: the header plus room
/// for a wrap sentinel behind the record.
pub const RESERVE_OVERHEAD: usize = 2 * HEADER_SIZE;

/// Opcode reserved for the wrap sentinel.
pub const WRAP_COMMAND: u16 = 0;

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub command: u16,
    pub length: u16,
}

impl RecordHeader {
    /// The zero-length wrap sentinel.
    pub const WRAP: Self = Self {
        command: WRAP_COMMAND,
        length: 0,
    };

    pub fn new(command: u16, length: u16) -> Self {
        Self { command, length }
    }

    /// True for the wrap sentinel.
    pub fn is_wrap(&self) -> bool {
        self.command == WRAP_COMMAND
    }

    /// Distance from this record's start to the next record.
    pub fn advance(&self) -> usize {
        record_advance(self.length as usize)
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let c = self.command.to_le_bytes();
        let l = self.length.to_le_bytes();
        [c[0], c[1], l[0], l[1]]
    }

    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            command: u16::from_le_bytes([bytes[0], bytes[1]]),
            length: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Round a payload length up to the next multiple of 4.
pub fn padded_len(length: usize) -> usize {
    (length + 3) & !3
}

/// Total bytes a committed record of `length` payload bytes occupies.
pub fn record_advance(length: usize) -> usize {
    padded_len(length) + HEADER_SIZE
}

/// Bytes `reserve(size)` must find free before it can return.
pub fn reservation_size(size: usize) -> usize {
    size + RESERVE_OVERHEAD
}
