//! Deterministic per-frame command stream.
//!
//! Both the control thread and the verifying worker walk the same script,
//! so the worker can check every decoded command against what was sent.

use crate::commands::{PackedVertex, RenderCommand, RenderFlags};

/// Fixed commands per frame besides triangles: clear, mode, Z range, vsync.
const FRAME_OVERHEAD: u64 = 4;

/// Commands emitted for one frame with `triangles` triangles.
pub fn commands_per_frame(triangles: u32) -> u64 {
    triangles as u64 + FRAME_OVERHEAD
}

/// Endless command stream: clear, render mode, Z range, triangles, vsync,
/// then the next frame.
#[derive(Debug, Clone)]
pub struct FrameScript {
    triangles: u32,
    frame: u32,
    step: u64,
}

impl FrameScript {
    pub fn new(triangles: u32) -> Self {
        Self {
            triangles,
            frame: 0,
            step: 0,
        }
    }

    /// Frame the next command belongs to.
    pub fn frame(&self) -> u32 {
        self.frame
    }
}

impl Iterator for FrameScript {
    type Item = RenderCommand;

    fn next(&mut self) -> Option<RenderCommand> {
        let frame = self.frame;
        let last = commands_per_frame(self.triangles) - 1;
        let cmd = match self.step {
            0 => RenderCommand::ClearFramebuffer {
                color: [frame as u8, (frame >> 8) as u8, 0x40, 0xFF],
                clear_depth: frame % 2 == 0,
            },
            1 => RenderCommand::SetRenderMode(RenderFlags {
                gouraud: true,
                textured: frame % 3 == 0,
                z_test: true,
                z_write: true,
                color_write: frame % 5 != 0,
            }),
            2 => RenderCommand::SetZRange {
                z_min: 0,
                z_max: 0xFFFF - (frame % 256) as u16,
            },
            s if s == last => RenderCommand::WaitVsync,
            s => triangle(frame, s - 3),
        };

        if self.step == last {
            self.step = 0;
            self.frame = self.frame.wrapping_add(1);
        } else {
            self.step += 1;
        }
        Some(cmd)
    }
}

fn triangle(frame: u32, index: u64) -> RenderCommand {
    let seed = mix((frame as u64) << 32 | index);
    let vertex = |k: u64| {
        let h = mix(seed ^ k);
        PackedVertex {
            color: h | 0xFF00_0000_0000_0000,
            uv: mix(h),
            // X/Y in Q12.4 within 640x480, Z in the high half.
            position: (h % (640 << 4)) | ((h >> 20) % (480 << 4)) << 16 | (h >> 48) << 32,
        }
    };
    RenderCommand::SubmitTriangle {
        vertices: [vertex(1), vertex(2), vertex(3)],
        textured: index % 2 == 1,
    }
}

/// 64-bit finalizer (splitmix64).
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
