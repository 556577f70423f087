//! Ring storage: the byte buffer and its two cursors.
//!
//! `put` is written only by the producer and `get` only by the consumer.
//! Each side publishes its cursor with a release store after touching the
//! bytes it owns, and reads the other cursor with an acquire load, so bytes
//! written before a cursor moves are visible to the other side once it
//! observes the new cursor value.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::error::FifoError;
use crate::record::{RecordHeader, HEADER_SIZE};

/// Bytes at the start of the buffer the consumer must have moved past
/// before the producer may wrap onto them.
pub const GUARD_SIZE: usize = HEADER_SIZE;

/// Free bytes between the cursors.
///
/// Deliberately conservative while between wraps (`put < get`): space behind
/// `get` is not counted until the consumer itself wraps.
pub fn free_space_between(put: usize, get: usize, end: usize) -> usize {
    if put >= get {
        end.saturating_sub(put)
    } else {
        get - put
    }
}

pub(crate) struct RingStorage {
    buffer: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    end: usize,
    // Padded so producer stores to `put` don't invalidate the consumer's
    // `get` line.
    put: CachePadded<AtomicUsize>,
    get: CachePadded<AtomicUsize>,
}

// Safety: byte ranges are handed out by the FIFO protocol so that the
// producer and consumer never touch the same bytes at the same time; the
// cursors that delimit those ranges are atomics.
unsafe impl Sync for RingStorage {}

impl RingStorage {
    /// Allocate `capacity` usable bytes plus room for a trailing sentinel.
    pub fn allocate(capacity: usize) -> Result<Self, FifoError> {
        let bytes = capacity
            .checked_add(GUARD_SIZE)
            .ok_or(FifoError::Allocation { bytes: capacity })?;
        let mut storage: Vec<UnsafeCell<u8>> = Vec::new();
        storage
            .try_reserve_exact(bytes)
            .map_err(|_| FifoError::Allocation { bytes })?;
        storage.resize_with(bytes, || UnsafeCell::new(0));

        Ok(Self {
            buffer: storage.into_boxed_slice(),
            capacity,
            end: capacity - 1,
            put: CachePadded::new(AtomicUsize::new(0)),
            get: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Last usable offset before the reserved tail.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn put(&self) -> usize {
        self.put.load(Ordering::Acquire)
    }

    pub fn get(&self) -> usize {
        self.get.load(Ordering::Acquire)
    }

    /// Producer only.
    pub fn publish_put(&self, put: usize) {
        self.put.store(put, Ordering::Release);
    }

    /// Consumer only.
    pub fn publish_get(&self, get: usize) {
        self.get.store(get, Ordering::Release);
    }

    /// # Safety
    ///
    /// The caller must own `[offset, offset + HEADER_SIZE)` under the FIFO
    /// protocol.
    pub unsafe fn write_header(&self, offset: usize, header: RecordHeader) {
        self.slice_mut(offset, HEADER_SIZE)
            .copy_from_slice(&header.encode());
    }

    /// # Safety
    ///
    /// The header at `offset` must be committed and not owned by the producer.
    pub unsafe fn read_header(&self, offset: usize) -> RecordHeader {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(self.slice(offset, HEADER_SIZE));
        RecordHeader::decode(bytes)
    }

    /// # Safety
    ///
    /// No `&mut` to any byte of the range may exist for the returned lifetime.
    pub unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.buffer.len(), "ring access out of bounds");
        std::slice::from_raw_parts(self.byte_ptr(offset), len)
    }

    /// # Safety
    ///
    /// The caller must have exclusive ownership of the range for the
    /// returned lifetime.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.buffer.len(), "ring access out of bounds");
        std::slice::from_raw_parts_mut(self.byte_ptr(offset), len)
    }

    fn byte_ptr(&self, offset: usize) -> *mut u8 {
        UnsafeCell::raw_get(self.buffer[offset..].as_ptr())
    }
}

impl std::fmt::Debug for RingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingStorage")
            .field("capacity", &self.capacity)
            .field("end", &self.end)
            .field("put", &self.put())
            .field("get", &self.get())
            .finish()
    }
}
