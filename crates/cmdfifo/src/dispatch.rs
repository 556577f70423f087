//! Worker-side loops that feed records to a command handler.

use crate::channel::Consumer;

/// Executes one command on the worker thread.
///
/// Implementations own the meaning of opcodes and payload layout; the FIFO
/// treats both as opaque. Any `FnMut(u16, &[u8])` is a handler.
pub trait CommandHandler {
    fn execute(&mut self, command: u16, payload: &[u8]);
}

impl<F: FnMut(u16, &[u8])> CommandHandler for F {
    fn execute(&mut self, command: u16, payload: &[u8]) {
        self(command, payload)
    }
}

/// Totals collected by [`run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Records executed.
    pub commands: u64,
    /// Payload bytes executed (excluding headers and padding).
    pub bytes: u64,
}

/// Execute every record that is queued right now.
///
/// With `wait` set, blocks for the first record; without it an empty FIFO
/// returns 0 immediately. Returns the number of records executed.
pub fn play_pending<H: CommandHandler + ?Sized>(
    consumer: &mut Consumer,
    handler: &mut H,
    wait: bool,
) -> usize {
    let mut count = 0;
    if wait {
        match consumer.get() {
            Some(record) => handler.execute(record.command, record.payload),
            None => return 0,
        }
        consumer.next();
        count += 1;
    }
    while let Some(record) = consumer.try_get() {
        handler.execute(record.command, record.payload);
        consumer.next();
        count += 1;
    }
    count
}

/// Execute records until the FIFO is shut down.
pub fn run<H: CommandHandler + ?Sized>(consumer: &mut Consumer, handler: &mut H) -> WorkerStats {
    let mut stats = WorkerStats::default();
    while let Some(record) = consumer.get() {
        stats.commands += 1;
        stats.bytes += record.payload.len() as u64;
        handler.execute(record.command, record.payload);
        consumer.next();
    }
    log::debug!(
        "worker stopped after {} commands ({} payload bytes)",
        stats.commands,
        stats.bytes
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::channel;
    use crate::config::FifoConfig;

    #[test]
    fn test_play_pending_without_wait_on_empty() {
        let (_tx, mut rx) = channel(&FifoConfig::with_capacity(64)).unwrap();
        let mut seen = Vec::new();
        let mut handler = |cmd: u16, _: &[u8]| seen.push(cmd);
        assert_eq!(play_pending(&mut rx, &mut handler, false), 0);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_play_pending_drains_queue() {
        let (mut tx, mut rx) = channel(&FifoConfig::with_capacity(256)).unwrap();
        tx.send(1, b"one");
        tx.send(2, b"two");
        tx.send(3, b"three");

        let mut seen: Vec<(u16, Vec<u8>)> = Vec::new();
        let mut handler = |cmd: u16, payload: &[u8]| seen.push((cmd, payload.to_vec()));
        assert_eq!(play_pending(&mut rx, &mut handler, true), 3);
        assert_eq!(
            seen,
            vec![
                (1, b"one".to_vec()),
                (2, b"two".to_vec()),
                (3, b"three".to_vec())
            ]
        );
        assert!(tx.is_empty());
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (mut tx, mut rx) = channel(&FifoConfig::with_capacity(256)).unwrap();
        tx.send(1, &[0; 10]);
        tx.send(2, &[0; 6]);

        let mut count = 0;
        let mut handler = |cmd: u16, _: &[u8]| {
            count += 1;
            if cmd == 2 {
                tx.shutdown();
            }
        };
        let stats = run(&mut rx, &mut handler);
        assert_eq!(stats.commands, 2);
        assert_eq!(stats.bytes, 16);
        assert_eq!(count, 2);
    }
}
