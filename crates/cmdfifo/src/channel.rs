//! Producer and consumer halves of the command FIFO.
//!
//! The producer reserves a region, fills it, and commits it under a command
//! opcode; the consumer blocks in [`Consumer::get`] until a record arrives and
//! releases it with [`Consumer::next`]. Three events carry the wakeups. Each
//! is owned by the half that waits on it; its signal lives in the shared
//! state:
//!
//! - `to_worker`: data was committed (or shutdown was requested).
//! - `to_control`: the FIFO drained; wakes a producer in [`Producer::flush`].
//! - `space`: the consumer released bytes; wakes a producer in
//!   [`Producer::reserve`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{max_payload_for, FifoConfig};
use crate::error::{FifoError, RecvError, TrySendError};
use crate::event::{Event, Signal};
use crate::record::{reservation_size, RecordHeader, HEADER_SIZE, WRAP_COMMAND};
use crate::ring::{free_space_between, RingStorage, GUARD_SIZE};

/// State shared by both halves.
#[derive(Debug)]
struct Shared {
    ring: RingStorage,
    label: String,
    shutdown: AtomicBool,
    to_worker: Signal,
    to_control: Signal,
    space: Signal,
}

impl Shared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            log::debug!("{}: shutdown requested", self.label);
        }
        self.to_worker.set();
        self.to_control.set();
        self.space.set();
    }
}

/// Create a FIFO and split it into its producer and consumer halves.
///
/// Allocates `capacity + 4` bytes of ring storage. Fails if the config is
/// invalid or the storage cannot be allocated; nothing is left behind on
/// failure.
pub fn channel(config: &FifoConfig) -> Result<(Producer, Consumer), FifoError> {
    config.validate()?;
    let ring = RingStorage::allocate(config.capacity).map_err(|e| {
        log::error!("{}: {}", config.label, e);
        e
    })?;

    let to_worker = Event::new();
    let to_control = Event::new();
    let space = Event::new();
    let shared = Arc::new(Shared {
        ring,
        label: config.label.clone(),
        shutdown: AtomicBool::new(false),
        to_worker: to_worker.signal(),
        to_control: to_control.signal(),
        space: space.signal(),
    });
    log::debug!(
        "{}: FIFO created, capacity {} bytes",
        config.label,
        config.capacity
    );

    let producer = Producer {
        shared: Arc::clone(&shared),
        put: 0,
        max_payload: max_payload_for(config.capacity),
        reserved: None,
        scratch: Vec::new(),
        to_control,
        space,
    };
    let consumer = Consumer {
        shared,
        get: 0,
        current: None,
        to_worker,
    };
    Ok((producer, consumer))
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    size: usize,
    /// False when the region is producer-private scratch handed out after
    /// shutdown.
    in_ring: bool,
}

/// Control-thread half: reserves, fills and commits records.
///
/// Dropping the producer shuts the FIFO down.
#[derive(Debug)]
pub struct Producer {
    shared: Arc<Shared>,
    /// Local copy of the put cursor; this half is its only writer.
    put: usize,
    max_payload: usize,
    reserved: Option<Reservation>,
    scratch: Vec<u8>,
    /// Woken when the FIFO drains.
    to_control: Event,
    /// Woken when the consumer releases bytes.
    space: Event,
}

impl Producer {
    /// Usable ring size in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Largest payload a single reservation may request.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Bytes available at the put cursor without waiting.
    pub fn free_space(&self) -> usize {
        free_space_between(self.put, self.shared.ring.get(), self.shared.ring.end())
    }

    /// True when the consumer has caught up with every commit.
    pub fn is_empty(&self) -> bool {
        self.put == self.shared.ring.get()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Reserve `size` payload bytes, blocking until the consumer frees
    /// enough space.
    ///
    /// The returned region is filled by the caller and published with
    /// [`commit`](Self::commit). If the FIFO is shut down before or while
    /// waiting, a private scratch region is returned instead and the
    /// following commit is dropped.
    ///
    /// # Panics
    ///
    /// If `size` exceeds [`max_payload`](Self::max_payload).
    pub fn reserve(&mut self, size: usize) -> &mut [u8] {
        self.check_size(size);
        let needed = reservation_size(size);
        loop {
            if self.shared.is_shutdown() {
                return self.reserve_scratch(size);
            }
            if self.make_space(needed) {
                break;
            }
            self.space.wait();
        }
        self.ring_region(size)
    }

    /// Non-blocking [`reserve`](Self::reserve).
    ///
    /// Returns `None` if the space is not available right now or the FIFO is
    /// shut down.
    pub fn try_reserve(&mut self, size: usize) -> Option<&mut [u8]> {
        self.check_size(size);
        if self.shared.is_shutdown() || !self.make_space(reservation_size(size)) {
            return None;
        }
        Some(self.ring_region(size))
    }

    /// Publish the reserved region as a record and wake the consumer.
    ///
    /// Silently dropped once the FIFO is shut down.
    ///
    /// # Panics
    ///
    /// If `command` is 0, if there is no outstanding reservation, or if
    /// `size` is larger than what was reserved.
    pub fn commit(&mut self, command: u16, size: usize) {
        assert_ne!(
            command, WRAP_COMMAND,
            "command 0 is reserved for the wrap sentinel"
        );
        let reservation = self.reserved.take();
        if self.shared.is_shutdown() {
            log::trace!(
                "{}: dropping command {} after shutdown",
                self.shared.label,
                command
            );
            return;
        }
        let Some(reservation) = reservation else {
            panic!("commit without a matching reserve");
        };
        assert!(
            size <= reservation.size,
            "commit of {} bytes exceeds the {} byte reservation",
            size,
            reservation.size
        );
        if !reservation.in_ring {
            return;
        }

        let header = RecordHeader::new(command, size as u16);
        // Safety: [put, put + needed) was reserved by make_space.
        unsafe { self.shared.ring.write_header(self.put, header) };
        self.put += header.advance();
        self.shared.ring.publish_put(self.put);
        self.shared.to_worker.set();
    }

    /// [`commit`](Self::commit) followed by [`flush`](Self::flush).
    pub fn commit_sync(&mut self, command: u16, size: usize) {
        if self.shared.is_shutdown() {
            self.reserved = None;
            return;
        }
        self.commit(command, size);
        self.flush();
    }

    /// Block until the consumer has released every committed record.
    ///
    /// Returns immediately when already drained, and as soon as the FIFO is
    /// shut down.
    pub fn flush(&mut self) {
        while self.put != self.shared.ring.get() {
            if self.shared.is_shutdown() {
                break;
            }
            self.to_control.wait();
        }
    }

    /// Copy `payload` into the FIFO as one record, waiting for space.
    pub fn send(&mut self, command: u16, payload: &[u8]) {
        assert_ne!(
            command, WRAP_COMMAND,
            "command 0 is reserved for the wrap sentinel"
        );
        self.reserve(payload.len()).copy_from_slice(payload);
        self.commit(command, payload.len());
    }

    /// Copy `payload` into the FIFO as one record without waiting.
    pub fn try_send(&mut self, command: u16, payload: &[u8]) -> Result<(), TrySendError> {
        assert_ne!(
            command, WRAP_COMMAND,
            "command 0 is reserved for the wrap sentinel"
        );
        if self.shared.is_shutdown() {
            return Err(TrySendError::Closed);
        }
        let region = self.try_reserve(payload.len()).ok_or(TrySendError::Full)?;
        region.copy_from_slice(payload);
        self.commit(command, payload.len());
        Ok(())
    }

    /// Mark the FIFO terminal and wake both sides. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Log the cursor state at trace level.
    pub fn dump_state(&self, tag: &str) {
        log::trace!(
            "{} {}: put {}, get {}, end {}",
            self.shared.label,
            tag,
            self.put,
            self.shared.ring.get(),
            self.shared.ring.end()
        );
    }

    fn check_size(&self, size: usize) {
        assert!(
            size <= self.max_payload,
            "reservation of {} bytes exceeds the {} byte limit",
            size,
            self.max_payload
        );
    }

    /// Try to make `needed` bytes available at the put cursor, wrapping to
    /// the buffer start when the tail is too short. Returns false when the
    /// consumer has to move first.
    fn make_space(&mut self, needed: usize) -> bool {
        let ring = &self.shared.ring;
        loop {
            let get = ring.get();
            if self.put < get {
                // Between wraps: only the gap up to get is usable.
                return get - self.put >= needed;
            }
            if self.put + needed <= ring.end() {
                return true;
            }
            if get < GUARD_SIZE {
                // Consumer is still at the buffer start; wrapping now would
                // make the FIFO look empty.
                return false;
            }

            // Safety: put >= get, so [put, put + 4) holds no unread record.
            unsafe { ring.write_header(self.put, RecordHeader::WRAP) };
            log::trace!("{}: producer wrap at {}", self.shared.label, self.put);
            self.put = 0;
            ring.publish_put(0);
            // The consumer may be parked on an empty FIFO; it has to read the
            // sentinel before the space behind it can be reused.
            self.shared.to_worker.set();
        }
    }

    fn ring_region(&mut self, size: usize) -> &mut [u8] {
        self.reserved = Some(Reservation {
            size,
            in_ring: true,
        });
        // Safety: make_space established ownership of [put, put + needed).
        unsafe { self.shared.ring.slice_mut(self.put + HEADER_SIZE, size) }
    }

    fn reserve_scratch(&mut self, size: usize) -> &mut [u8] {
        self.reserved = Some(Reservation {
            size,
            in_ring: false,
        });
        self.scratch.clear();
        self.scratch.resize(size, 0);
        &mut self.scratch[..]
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

/// A record borrowed from the ring. Valid until [`Consumer::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub command: u16,
    pub payload: &'a [u8],
}

impl Record<'_> {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Result of a copy-out receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub command: u16,
    pub length: usize,
}

enum Next {
    Record(RecordHeader),
    Empty,
    Closed,
}

/// Worker-thread half: reads records in commit order.
///
/// Dropping the consumer shuts the FIFO down, so a producer waiting for
/// space is released.
#[derive(Debug)]
pub struct Consumer {
    shared: Arc<Shared>,
    /// Local copy of the get cursor; this half is its only writer.
    get: usize,
    /// Advance of the record last returned by `get`.
    current: Option<usize>,
    /// Woken on commit, producer wrap and shutdown.
    to_worker: Event,
}

impl Consumer {
    /// Usable ring size in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.put() == self.get
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Block until a record is available and return it.
    ///
    /// Returns `None` once the FIFO is shut down, and keeps returning `None`
    /// without blocking from then on. Call [`next`](Self::next) to release
    /// the record before the following `get`.
    pub fn get(&mut self) -> Option<Record<'_>> {
        match self.next_header(true) {
            Next::Record(header) => Some(self.record(header)),
            Next::Empty | Next::Closed => None,
        }
    }

    /// Non-blocking [`get`](Self::get). `None` when empty or shut down.
    pub fn try_get(&mut self) -> Option<Record<'_>> {
        match self.next_header(false) {
            Next::Record(header) => Some(self.record(header)),
            Next::Empty | Next::Closed => None,
        }
    }

    /// Release the record returned by the last `get`.
    ///
    /// # Panics
    ///
    /// If no record is outstanding (unless the FIFO is shut down).
    pub fn next(&mut self) {
        let Some(advance) = self.current.take() else {
            if self.shared.is_shutdown() {
                return;
            }
            panic!("next without a record from get");
        };
        self.get += advance;
        self.shared.ring.publish_get(self.get);
        self.shared.space.set();
        if self.shared.ring.put() == self.get {
            self.shared.to_control.set();
        }
    }

    /// Copy the next record into `out` and release it.
    ///
    /// With `wait == false` an empty FIFO yields `Ok(None)`. A record larger
    /// than `out` stays queued and is reported as
    /// [`RecvError::BufferTooSmall`].
    pub fn recv_into(&mut self, out: &mut [u8], wait: bool) -> Result<Option<Message>, RecvError> {
        let header = match self.next_header(wait) {
            Next::Record(header) => header,
            Next::Empty => return Ok(None),
            Next::Closed => return Err(RecvError::Closed),
        };
        let length = header.length as usize;
        if out.len() < length {
            return Err(RecvError::BufferTooSmall { needed: length });
        }
        out[..length].copy_from_slice(self.record(header).payload);
        self.next();
        Ok(Some(Message {
            command: header.command,
            length,
        }))
    }

    /// Mark the FIFO terminal and wake both sides. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Log the cursor state at trace level.
    pub fn dump_state(&self, tag: &str) {
        log::trace!(
            "{} {}: put {}, get {}, end {}",
            self.shared.label,
            tag,
            self.shared.ring.put(),
            self.get,
            self.shared.ring.end()
        );
    }

    fn record(&mut self, header: RecordHeader) -> Record<'_> {
        self.current = Some(header.advance());
        // Safety: the record at get is committed and owned by the consumer
        // until next() publishes the advanced cursor.
        let payload = unsafe {
            self.shared
                .ring
                .slice(self.get + HEADER_SIZE, header.length as usize)
        };
        Record {
            command: header.command,
            payload,
        }
    }

    /// Find the header of the next real record, following wrap sentinels.
    fn next_header(&mut self, wait: bool) -> Next {
        let shared = &self.shared;
        loop {
            loop {
                if shared.is_shutdown() {
                    return Next::Closed;
                }
                if shared.ring.put() != self.get {
                    break;
                }
                if !wait {
                    return Next::Empty;
                }
                shared.to_control.set();
                self.to_worker.wait();
            }

            // Safety: put != get, so the header at get is committed.
            let header = unsafe { shared.ring.read_header(self.get) };
            if !header.is_wrap() {
                return Next::Record(header);
            }

            log::trace!("{}: consumer wrap at {}", shared.label, self.get);
            self.get = 0;
            shared.ring.publish_get(0);
            shared.space.set();
            if shared.ring.put() == 0 {
                shared.to_control.set();
            }
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
