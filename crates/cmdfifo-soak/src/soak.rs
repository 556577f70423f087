//! Control/worker soak run over a command FIFO.
//!
//! The control thread encodes the frame script into the FIFO; the worker
//! thread decodes every record and compares it with its own copy of the
//! script.

use std::thread;
use std::time::{Duration, Instant};

use cmdfifo::dispatch::{self, CommandHandler, WorkerStats};
use cmdfifo::{FifoConfig, FifoError};

use crate::commands::{DecodeError, RenderCommand, MAX_COMMAND_BYTES};
use crate::scene::{commands_per_frame, FrameScript};

/// Number of frames between progress log lines on the worker.
const PERF_LOG_INTERVAL: u32 = 120;

/// Soak run parameters.
#[derive(Debug, Clone)]
pub struct SoakConfig {
    pub fifo: FifoConfig,
    pub frames: u32,
    pub triangles_per_frame: u32,
    /// Submit every n-th vsync synchronously (0 = never).
    pub sync_every: u32,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            fifo: FifoConfig::with_capacity(4096).label("to-render"),
            frames: 200,
            triangles_per_frame: 64,
            sync_every: 0,
        }
    }
}

/// Errors that end a soak run.
#[derive(Debug, thiserror::Error)]
pub enum SoakError {
    /// The FIFO could not be created.
    #[error("FIFO setup failed: {0}")]
    Fifo(#[from] FifoError),

    /// The FIFO is too small for the largest render command.
    #[error("a {capacity} byte FIFO cannot hold a {needed} byte command")]
    CapacityTooSmall { capacity: usize, needed: usize },

    /// A record did not decode.
    #[error("command {index}: {source}")]
    Decode { index: u64, source: DecodeError },

    /// The worker saw a different command than the control thread sent.
    #[error("command {index}: expected {expected}, got {actual}")]
    Mismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    /// The worker executed a different number of commands than were sent.
    #[error("sent {sent} commands but the worker executed {executed}")]
    Count { sent: u64, executed: u64 },

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    /// The worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Outcome of a successful soak run.
#[derive(Debug, Clone, Copy)]
pub struct SoakReport {
    pub commands: u64,
    pub payload_bytes: u64,
    pub frames: u32,
    pub elapsed: Duration,
}

impl SoakReport {
    pub fn commands_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.commands as f64 / secs
        } else {
            0.0
        }
    }
}

/// Worker-side handler: decodes each record and checks it against the
/// script. Stops checking after the first failure.
#[derive(Debug)]
pub struct VerifyingExecutor {
    script: FrameScript,
    executed: u64,
    frames: u32,
    failure: Option<SoakError>,
}

impl VerifyingExecutor {
    pub fn new(triangles_per_frame: u32) -> Self {
        Self {
            script: FrameScript::new(triangles_per_frame),
            executed: 0,
            frames: 0,
            failure: None,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn into_result(self) -> Result<u64, SoakError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.executed),
        }
    }
}

impl CommandHandler for VerifyingExecutor {
    fn execute(&mut self, command: u16, payload: &[u8]) {
        let index = self.executed;
        self.executed += 1;
        let expected = self.script.next();
        if self.failure.is_some() {
            return;
        }

        let actual = match RenderCommand::decode(command, payload) {
            Ok(cmd) => cmd,
            Err(source) => {
                log::warn!("command {}: {}", index, source);
                self.failure = Some(SoakError::Decode { index, source });
                return;
            }
        };
        if expected != Some(actual) {
            log::warn!("command {}: stream mismatch", index);
            self.failure = Some(SoakError::Mismatch {
                index,
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            });
            return;
        }

        if actual == RenderCommand::WaitVsync {
            self.frames += 1;
            if self.frames % PERF_LOG_INTERVAL == 0 {
                log::info!("worker: frame={}, commands={}", self.frames, self.executed);
            }
        }
    }
}

/// Drive `config.frames` frames through a fresh FIFO and verify them.
pub fn run_soak(config: &SoakConfig) -> Result<SoakReport, SoakError> {
    let (mut producer, mut consumer) = cmdfifo::channel(&config.fifo)?;
    if producer.max_payload() < MAX_COMMAND_BYTES {
        return Err(SoakError::CapacityTooSmall {
            capacity: config.fifo.capacity,
            needed: MAX_COMMAND_BYTES,
        });
    }
    let triangles = config.triangles_per_frame;

    let worker = thread::Builder::new()
        .name("render-worker".into())
        .spawn(move || {
            let mut executor = VerifyingExecutor::new(triangles);
            let stats = dispatch::run(&mut consumer, &mut executor);
            (stats, executor)
        })
        .map_err(SoakError::Spawn)?;

    log::info!(
        "soak: {} frames x {} commands through a {} byte FIFO",
        config.frames,
        commands_per_frame(triangles),
        config.fifo.capacity
    );

    let start = Instant::now();
    let total = config.frames as u64 * commands_per_frame(triangles);
    let mut script = FrameScript::new(triangles);
    for _ in 0..total {
        let Some(cmd) = script.next() else { break };
        let bytes = cmd.encode();
        producer.reserve(bytes.len()).copy_from_slice(&bytes);

        // The script has already moved on, so a vsync closed frame() - 1.
        let sync = cmd == RenderCommand::WaitVsync
            && config.sync_every > 0
            && script.frame() % config.sync_every == 0;
        if sync {
            producer.commit_sync(cmd.opcode(), bytes.len());
        } else {
            producer.commit(cmd.opcode(), bytes.len());
        }
    }
    producer.flush();
    let elapsed = start.elapsed();
    producer.shutdown();

    let (stats, executor): (WorkerStats, VerifyingExecutor) =
        worker.join().map_err(|_| SoakError::WorkerPanicked)?;
    let frames = executor.frames();
    let executed = executor.into_result()?;
    if executed != total {
        return Err(SoakError::Count {
            sent: total,
            executed,
        });
    }

    Ok(SoakReport {
        commands: stats.commands,
        payload_bytes: stats.bytes,
        frames,
        elapsed,
    })
}
