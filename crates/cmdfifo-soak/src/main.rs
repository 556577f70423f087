//! Command FIFO soak test
//!
//! Runs a control thread and a render worker thread connected by a cmdfifo
//! channel and reports throughput once every command has been verified.

use clap::Parser;
use std::process;

use cmdfifo::FifoConfig;
use cmdfifo_soak::{run_soak, SoakConfig};

#[derive(Parser, Debug)]
#[command(name = "cmdfifo-soak")]
#[command(about = "Stream render commands through a command FIFO and verify them", long_about = None)]
#[command(version)]
struct Cli {
    /// FIFO capacity in bytes (multiple of 4, at least 16)
    #[arg(short, long, default_value = "4096")]
    capacity: usize,

    /// Number of frames to submit
    #[arg(short, long, default_value = "200")]
    frames: u32,

    /// Triangles per frame
    #[arg(short, long, default_value = "64")]
    triangles: u32,

    /// Submit every n-th vsync synchronously (0 = never)
    #[arg(long, default_value = "0")]
    sync_every: u32,

    /// Suppress progress output (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn soak_config(&self) -> SoakConfig {
        SoakConfig {
            fifo: FifoConfig::with_capacity(self.capacity).label("to-render"),
            frames: self.frames,
            triangles_per_frame: self.triangles,
            sync_every: self.sync_every,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging (suppressed if --quiet)
    if !cli.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    match run_soak(&cli.soak_config()) {
        Ok(report) => {
            if !cli.quiet {
                eprintln!(
                    "Success: {} commands ({} frames, {} payload bytes) in {:.1?}, {:.0} commands/s",
                    report.commands,
                    report.frames,
                    report.payload_bytes,
                    report.elapsed,
                    report.commands_per_sec()
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
