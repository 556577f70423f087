//! Two-thread integration tests for the command FIFO.
//!
//! Covers ordering, drain/flush, wraparound through the sentinel record,
//! backpressure at the capacity boundary, and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cmdfifo::{channel, Consumer, FifoConfig, FifoError, Producer, RecvError, TrySendError};

/// Long enough for a blocked thread to have reached its wait.
const SETTLE: Duration = Duration::from_millis(50);

/// Upper bound for anything that should happen "promptly".
const PROMPT: Duration = Duration::from_secs(5);

fn make_channel(capacity: usize) -> (Producer, Consumer) {
    channel(&FifoConfig::with_capacity(capacity).label("it")).unwrap()
}

/// Deterministic payload for record `i`: varying length, content tied to `i`.
fn payload_for(i: usize) -> Vec<u8> {
    let len = (i * 7) % 41;
    (0..len).map(|b| (i as u8).wrapping_mul(31).wrapping_add(b as u8)).collect()
}

fn command_for(i: usize) -> u16 {
    (i % 0xFFFE) as u16 + 1
}

/// Collect records on a worker thread until shutdown.
fn spawn_collector(mut rx: Consumer) -> thread::JoinHandle<Vec<(u16, Vec<u8>)>> {
    thread::spawn(move || {
        let mut out = Vec::new();
        while let Some(record) = rx.get() {
            out.push((record.command, record.payload.to_vec()));
            rx.next();
        }
        out
    })
}

// ============================================================================
// Ordering
// ============================================================================

mod ordering_tests {
    use super::*;

    #[test]
    fn records_arrive_in_commit_order() {
        let (mut tx, rx) = make_channel(256);
        let worker = spawn_collector(rx);

        const N: usize = 2000;
        for i in 0..N {
            let payload = payload_for(i);
            tx.reserve(payload.len()).copy_from_slice(&payload);
            tx.commit(command_for(i), payload.len());
        }
        tx.flush();
        tx.shutdown();

        let received = worker.join().unwrap();
        assert_eq!(received.len(), N);
        for (i, (command, payload)) in received.iter().enumerate() {
            assert_eq!(*command, command_for(i), "command mismatch at {}", i);
            assert_eq!(*payload, payload_for(i), "payload mismatch at {}", i);
        }
    }

    #[test]
    fn large_records_survive_many_wraps() {
        let (mut tx, rx) = make_channel(128);
        let worker = spawn_collector(rx);
        let max = tx.max_payload();

        for i in 0..500 {
            let len = if i % 3 == 0 { max } else { i % max };
            let payload: Vec<u8> = (0..len).map(|b| (b ^ i) as u8).collect();
            tx.send(command_for(i), &payload);
        }
        tx.flush();
        tx.shutdown();

        let received = worker.join().unwrap();
        assert_eq!(received.len(), 500);
        for (i, (command, payload)) in received.iter().enumerate() {
            let len = if i % 3 == 0 { max } else { i % max };
            let expected: Vec<u8> = (0..len).map(|b| (b ^ i) as u8).collect();
            assert_eq!(*command, command_for(i));
            assert_eq!(*payload, expected);
        }
    }
}

// ============================================================================
// Drain / flush
// ============================================================================

mod flush_tests {
    use super::*;

    #[test]
    fn flush_on_empty_channel_returns_immediately() {
        let (mut tx, _rx) = make_channel(64);
        tx.flush();
        assert!(tx.is_empty());
    }

    #[test]
    fn flush_waits_for_consumer_to_drain() {
        let (mut tx, mut rx) = make_channel(256);
        let released = Arc::new(AtomicBool::new(false));

        for i in 0..5 {
            tx.send(command_for(i), &payload_for(i));
        }

        let worker = {
            let released = Arc::clone(&released);
            thread::spawn(move || {
                thread::sleep(SETTLE);
                let mut count = 0;
                while count < 5 {
                    rx.get().unwrap();
                    count += 1;
                    if count == 5 {
                        released.store(true, Ordering::SeqCst);
                    }
                    rx.next();
                }
                rx
            })
        };

        tx.flush();
        assert!(released.load(Ordering::SeqCst));
        assert!(tx.is_empty());
        let _rx = worker.join().unwrap();
    }

    #[test]
    fn commit_sync_returns_after_record_is_released() {
        let (mut tx, mut rx) = make_channel(128);
        let (done_tx, done_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let record = rx.get().unwrap();
            assert_eq!(record.command, 42);
            assert_eq!(record.payload, b"sync");
            thread::sleep(SETTLE);
            done_tx.send(()).unwrap();
            rx.next();
            rx
        });

        tx.reserve(4).copy_from_slice(b"sync");
        tx.commit_sync(42, 4);
        // The worker signalled before releasing the record.
        assert!(done_rx.try_recv().is_ok());
        assert!(tx.is_empty());
        let _rx = worker.join().unwrap();
    }
}

// ============================================================================
// Wraparound
// ============================================================================

mod wrap_tests {
    use super::*;

    #[test]
    fn second_record_wraps_to_buffer_start() {
        let (mut tx, rx) = make_channel(64);
        assert_eq!(tx.free_space(), 63);

        // 52 + 8 = 60 bytes needed; occupies [0, 56).
        let first: Vec<u8> = (0..52).collect();
        tx.send(10, &first);
        assert_eq!(tx.free_space(), 7);

        let worker = spawn_collector(rx);

        // 12 + 8 = 20 bytes needed; the tail is too short, so the producer
        // writes a sentinel at 56 and restarts at 0 once the first record
        // has been released.
        let second: Vec<u8> = (100..112).collect();
        tx.send(20, &second);
        tx.flush();
        assert_eq!(tx.free_space(), 63 - 16);
        tx.shutdown();

        let received = worker.join().unwrap();
        assert_eq!(received, vec![(10, first), (20, second)]);
    }

    #[test]
    fn wrap_blocks_while_consumer_sits_at_buffer_start() {
        let (mut tx, mut rx) = make_channel(64);
        tx.send(1, &[0x11; 52]);

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            tx.send(2, &[0x22; 12]);
            done_tx.send(()).unwrap();
            tx
        });

        thread::sleep(SETTLE);
        assert!(done_rx.try_recv().is_err(), "producer must wait for the consumer");

        let record = rx.get().unwrap();
        assert_eq!(record.command, 1);
        rx.next();

        done_rx.recv_timeout(PROMPT).expect("producer should finish after next()");
        let record = rx.get().unwrap();
        assert_eq!(record.command, 2);
        assert_eq!(record.payload, &[0x22; 12]);
        rx.next();
        assert!(rx.is_empty());
        let _tx = producer.join().unwrap();
    }
}

// ============================================================================
// Capacity boundary / backpressure
// ============================================================================

mod capacity_tests {
    use super::*;

    #[test]
    fn reservation_equal_to_free_space_does_not_wrap() {
        let (mut tx, mut rx) = make_channel(64);
        assert_eq!(tx.free_space(), 63);

        // 55 + 8 = 63 bytes needed: exactly the free space.
        let payload = vec![0x5A; 55];
        assert!(tx.try_send(9, &payload).is_ok());
        assert_eq!(tx.free_space(), 3);

        let record = rx.get().unwrap();
        assert_eq!(record.command, 9);
        assert_eq!(record.payload, &payload[..]);
        rx.next();
        assert!(rx.is_empty());
    }

    #[test]
    fn oversized_reservation_blocks_until_consumer_advances() {
        let (mut tx, mut rx) = make_channel(64);
        tx.send(1, &[1; 55]);
        assert_eq!(tx.try_send(2, &[2; 4]), Err(TrySendError::Full));

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            tx.send(2, &[2; 4]);
            done_tx.send(()).unwrap();
            tx
        });

        thread::sleep(SETTLE);
        assert!(done_rx.try_recv().is_err());

        rx.get().unwrap();
        rx.next();
        done_rx.recv_timeout(PROMPT).expect("producer should resume");

        let record = rx.get().unwrap();
        assert_eq!((record.command, record.payload), (2, &[2u8; 4][..]));
        rx.next();
        let _tx = producer.join().unwrap();
    }

    #[test]
    fn try_send_fills_then_reports_full() {
        let (mut tx, _rx) = make_channel(64);
        let mut sent = 0;
        while tx.try_send(3, &[0; 4]).is_ok() {
            sent += 1;
        }
        // Each 4-byte record advances 8 bytes and needs 12 free.
        assert_eq!(sent, 7);
        assert_eq!(tx.try_send(3, &[0; 4]), Err(TrySendError::Full));
    }
}

// ============================================================================
// Copy-out receive
// ============================================================================

mod recv_tests {
    use super::*;

    #[test]
    fn recv_into_without_wait_on_empty() {
        let (_tx, mut rx) = make_channel(64);
        let mut buf = [0u8; 16];
        assert_eq!(rx.recv_into(&mut buf, false), Ok(None));
    }

    #[test]
    fn recv_into_copies_and_releases() {
        let (mut tx, mut rx) = make_channel(64);
        tx.send(4, b"hello");
        let mut buf = [0u8; 16];
        let message = rx.recv_into(&mut buf, true).unwrap().unwrap();
        assert_eq!(message.command, 4);
        assert_eq!(&buf[..message.length], b"hello");
        assert!(tx.is_empty());
    }

    #[test]
    fn recv_into_keeps_record_when_buffer_too_small() {
        let (mut tx, mut rx) = make_channel(64);
        tx.send(4, b"hello world");
        let mut small = [0u8; 4];
        assert_eq!(
            rx.recv_into(&mut small, false),
            Err(RecvError::BufferTooSmall { needed: 11 })
        );
        assert!(!tx.is_empty());

        let mut buf = [0u8; 16];
        let message = rx.recv_into(&mut buf, false).unwrap().unwrap();
        assert_eq!(&buf[..message.length], b"hello world");
    }

    #[test]
    fn recv_into_after_shutdown() {
        let (tx, mut rx) = make_channel(64);
        tx.shutdown();
        let mut buf = [0u8; 4];
        assert_eq!(rx.recv_into(&mut buf, true), Err(RecvError::Closed));
    }
}

// ============================================================================
// Shutdown
// ============================================================================

mod shutdown_tests {
    use super::*;

    #[test]
    fn shutdown_unblocks_waiting_consumer() {
        let (tx, mut rx) = make_channel(64);
        let (done_tx, done_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let first = rx.get().map(|r| r.command);
            done_tx.send(first).unwrap();
            // Terminal: every later call returns at once.
            for _ in 0..3 {
                assert!(rx.get().is_none());
            }
        });

        thread::sleep(SETTLE);
        assert!(done_rx.try_recv().is_err(), "consumer should be blocked");
        tx.shutdown();
        assert_eq!(done_rx.recv_timeout(PROMPT).unwrap(), None);
        worker.join().unwrap();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (tx, mut rx) = make_channel(64);
        tx.shutdown();
        tx.shutdown();
        rx.shutdown();
        assert!(tx.is_shutdown());
        assert!(rx.get().is_none());
    }

    #[test]
    fn commit_after_shutdown_is_dropped() {
        let (mut tx, mut rx) = make_channel(64);
        tx.send(1, b"kept");
        tx.shutdown();

        tx.reserve(8).copy_from_slice(b"stray!!!");
        tx.commit(2, 8);
        tx.commit_sync(3, 0);
        assert_eq!(tx.try_send(4, b"x"), Err(TrySendError::Closed));

        assert!(rx.get().is_none());
        assert!(rx.get().is_none());
    }

    #[test]
    fn dropping_producer_shuts_down() {
        let (tx, rx) = make_channel(64);
        let worker = spawn_collector(rx);
        drop(tx);
        assert!(worker.join().unwrap().is_empty());
    }

    #[test]
    fn dropping_consumer_releases_blocked_producer() {
        let (mut tx, rx) = make_channel(64);
        tx.send(1, &[0; 55]);

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            tx.send(2, &[0; 40]);
            done_tx.send(tx.is_shutdown()).unwrap();
        });

        thread::sleep(SETTLE);
        assert!(done_rx.try_recv().is_err());
        drop(rx);
        assert!(done_rx.recv_timeout(PROMPT).unwrap());
        producer.join().unwrap();
    }

    #[test]
    fn shutdown_releases_flushing_producer() {
        let (mut tx, rx) = make_channel(64);
        tx.send(1, b"never read");
        let (done_tx, done_rx) = mpsc::channel();

        let producer = thread::spawn(move || {
            tx.flush();
            done_tx.send(()).unwrap();
        });

        thread::sleep(SETTLE);
        assert!(done_rx.try_recv().is_err());
        rx.shutdown();
        done_rx.recv_timeout(PROMPT).expect("flush should return after shutdown");
        producer.join().unwrap();
    }
}

// ============================================================================
// Setup
// ============================================================================

mod setup_tests {
    use super::*;

    #[test]
    fn oversized_capacity_reports_allocation_error() {
        // Passes validation: at least the minimum and a multiple of 4.
        let config = FifoConfig::with_capacity(usize::MAX - 3);
        assert!(config.validate().is_ok());
        let err = channel(&config).unwrap_err();
        assert!(matches!(err, FifoError::Allocation { .. }));
    }
}
