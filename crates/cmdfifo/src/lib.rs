//! Bounded single-producer/single-consumer byte command FIFO.
//!
//! A control thread reserves space in a ring buffer, writes a command
//! payload in place and commits it under a 16-bit opcode; a worker thread
//! blocks until records arrive and executes them in commit order.
//!
//! ```no_run
//! use cmdfifo::{channel, FifoConfig};
//!
//! let (mut producer, mut consumer) = channel(&FifoConfig::with_capacity(4096)).unwrap();
//!
//! let worker = std::thread::spawn(move || {
//!     while let Some(record) = consumer.get() {
//!         println!("command {} ({} bytes)", record.command, record.len());
//!         consumer.next();
//!     }
//! });
//!
//! producer.reserve(4).copy_from_slice(&[1, 2, 3, 4]);
//! producer.commit_sync(1, 4);
//! producer.shutdown();
//! worker.join().unwrap();
//! ```
//!
//! The ring never wraps with modulo arithmetic: when a record does not fit
//! in the tail, the producer writes a zero-opcode sentinel and restarts at
//! offset 0, and the consumer follows the sentinel. Opcode 0 is therefore
//! reserved.

/// Producer and consumer halves.
pub mod channel;

/// FIFO configuration.
pub mod config;

/// Worker loops driving a command handler.
pub mod dispatch;

/// Error types.
pub mod error;

/// Binary auto-reset event.
pub mod event;

/// Record header layout and sizing.
pub mod record;

/// Ring buffer storage and cursors.
pub mod ring;

pub use channel::{channel, Consumer, Message, Producer, Record};
pub use config::FifoConfig;
pub use dispatch::{CommandHandler, WorkerStats};
pub use error::{FifoError, RecvError, TrySendError};
pub use event::{Event, Signal};
