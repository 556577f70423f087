//! Render commands carried over the FIFO.
//!
//! Each command travels as one FIFO record: the opcode is the record's
//! command and the fields are packed little-endian into the payload.

/// Largest encoded payload (a textured triangle).
pub const MAX_COMMAND_BYTES: usize = 3 * VERTEX_BYTES + 1;

/// Fixed-capacity buffer holding one encoded command.
pub type CommandBytes = heapless::Vec<u8, MAX_COMMAND_BYTES>;

const VERTEX_BYTES: usize = 24;

/// Record opcodes. Zero is reserved by the FIFO.
pub mod opcode {
    pub const CLEAR_FRAMEBUFFER: u16 = 1;
    pub const SET_RENDER_MODE: u16 = 2;
    pub const SET_Z_RANGE: u16 = 3;
    pub const SUBMIT_TRIANGLE: u16 = 4;
    pub const WAIT_VSYNC: u16 = 5;
}

/// Errors decoding a record back into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The opcode is not a render command.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),

    /// The payload length does not match the opcode.
    #[error("opcode {opcode}: expected {expected} payload bytes, got {actual}")]
    Length {
        opcode: u16,
        expected: usize,
        actual: usize,
    },
}

/// Vertex already packed into register words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackedVertex {
    pub color: u64,
    pub uv: u64,
    pub position: u64,
}

/// Rendering state flags (RENDER_MODE).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderFlags {
    pub gouraud: bool,
    pub textured: bool,
    pub z_test: bool,
    pub z_write: bool,
    /// False = Z-only prepass.
    pub color_write: bool,
}

impl RenderFlags {
    pub fn to_bits(self) -> u8 {
        (self.gouraud as u8)
            | (self.textured as u8) << 1
            | (self.z_test as u8) << 2
            | (self.z_write as u8) << 3
            | (self.color_write as u8) << 4
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            gouraud: bits & 1 != 0,
            textured: bits & (1 << 1) != 0,
            z_test: bits & (1 << 2) != 0,
            z_write: bits & (1 << 3) != 0,
            color_write: bits & (1 << 4) != 0,
        }
    }
}

/// Unit of work handed from the control thread to the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderCommand {
    /// Clear the framebuffer to a solid color.
    ClearFramebuffer { color: [u8; 4], clear_depth: bool },
    /// Set the rendering mode.
    SetRenderMode(RenderFlags),
    /// Depth range clipping, both bounds inclusive.
    SetZRange { z_min: u16, z_max: u16 },
    /// Submit a pre-packed screen-space triangle.
    SubmitTriangle {
        vertices: [PackedVertex; 3],
        textured: bool,
    },
    /// Wait for vertical sync and swap framebuffers.
    WaitVsync,
}

impl RenderCommand {
    pub fn opcode(&self) -> u16 {
        match self {
            RenderCommand::ClearFramebuffer { .. } => opcode::CLEAR_FRAMEBUFFER,
            RenderCommand::SetRenderMode(_) => opcode::SET_RENDER_MODE,
            RenderCommand::SetZRange { .. } => opcode::SET_Z_RANGE,
            RenderCommand::SubmitTriangle { .. } => opcode::SUBMIT_TRIANGLE,
            RenderCommand::WaitVsync => opcode::WAIT_VSYNC,
        }
    }

    /// Pack the command fields into a record payload.
    pub fn encode(&self) -> CommandBytes {
        let mut out = CommandBytes::new();
        match self {
            RenderCommand::ClearFramebuffer { color, clear_depth } => {
                put(&mut out, color);
                put(&mut out, &[*clear_depth as u8]);
            }
            RenderCommand::SetRenderMode(flags) => put(&mut out, &[flags.to_bits()]),
            RenderCommand::SetZRange { z_min, z_max } => {
                put(&mut out, &z_min.to_le_bytes());
                put(&mut out, &z_max.to_le_bytes());
            }
            RenderCommand::SubmitTriangle { vertices, textured } => {
                for v in vertices {
                    put(&mut out, &v.color.to_le_bytes());
                    put(&mut out, &v.uv.to_le_bytes());
                    put(&mut out, &v.position.to_le_bytes());
                }
                put(&mut out, &[*textured as u8]);
            }
            RenderCommand::WaitVsync => {}
        }
        out
    }

    /// Rebuild a command from a record.
    pub fn decode(code: u16, payload: &[u8]) -> Result<Self, DecodeError> {
        let check_len = |expected: usize| {
            if payload.len() == expected {
                Ok(())
            } else {
                Err(DecodeError::Length {
                    opcode: code,
                    expected,
                    actual: payload.len(),
                })
            }
        };

        match code {
            opcode::CLEAR_FRAMEBUFFER => {
                check_len(5)?;
                Ok(RenderCommand::ClearFramebuffer {
                    color: [payload[0], payload[1], payload[2], payload[3]],
                    clear_depth: payload[4] != 0,
                })
            }
            opcode::SET_RENDER_MODE => {
                check_len(1)?;
                Ok(RenderCommand::SetRenderMode(RenderFlags::from_bits(payload[0])))
            }
            opcode::SET_Z_RANGE => {
                check_len(4)?;
                Ok(RenderCommand::SetZRange {
                    z_min: u16::from_le_bytes([payload[0], payload[1]]),
                    z_max: u16::from_le_bytes([payload[2], payload[3]]),
                })
            }
            opcode::SUBMIT_TRIANGLE => {
                check_len(MAX_COMMAND_BYTES)?;
                let mut vertices = [PackedVertex::default(); 3];
                for (v, chunk) in vertices.iter_mut().zip(payload.chunks_exact(VERTEX_BYTES)) {
                    v.color = read_u64(&chunk[0..8]);
                    v.uv = read_u64(&chunk[8..16]);
                    v.position = read_u64(&chunk[16..24]);
                }
                Ok(RenderCommand::SubmitTriangle {
                    vertices,
                    textured: payload[MAX_COMMAND_BYTES - 1] != 0,
                })
            }
            opcode::WAIT_VSYNC => {
                check_len(0)?;
                Ok(RenderCommand::WaitVsync)
            }
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

fn put(out: &mut CommandBytes, bytes: &[u8]) {
    let fits = out.extend_from_slice(bytes).is_ok();
    debug_assert!(fits, "MAX_COMMAND_BYTES too small");
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}
