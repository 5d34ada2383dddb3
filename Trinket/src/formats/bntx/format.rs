//! BNTX pixel formats.

use crate::error::{Error, Result};

/// ASTC block footprints, in format-id order starting at `0x2D`.
const ASTC_BLOCKS: [(u32, u32); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];

/// Surface pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    R4G4B4A4,
    R5G6B5,
    R8G8,
    R16,
    R8G8B8A8 { srgb: bool },
    B8G8R8A8 { srgb: bool },
    R10G10B10A2,
    Bc1 { srgb: bool },
    Bc2 { srgb: bool },
    Bc3 { srgb: bool },
    Bc4 { signed: bool },
    Bc5 { signed: bool },
    Bc6h { signed: bool },
    Bc7 { srgb: bool },
    Astc { block_width: u32, block_height: u32, srgb: bool },
}

impl PixelFormat {
    /// Decode a BNTX format id: the high byte names the channel layout, the
    /// low byte the numeric interpretation.
    ///
    /// # Errors
    /// Returns [`Error::UnknownPixelFormat`] for ids outside the table.
    pub fn from_u32(format: u32) -> Result<Self> {
        let kind = format >> 8;
        let variant = format & 0xFF;
        let srgb = variant == 0x06;
        let signed = variant == 0x02;

        Ok(match kind {
            0x02 => Self::R8,
            0x03 => Self::R4G4B4A4,
            0x07 => Self::R5G6B5,
            0x09 => Self::R8G8,
            0x0A => Self::R16,
            0x0B => Self::R8G8B8A8 { srgb },
            0x0C => Self::B8G8R8A8 { srgb },
            0x0E => Self::R10G10B10A2,
            0x1A => Self::Bc1 { srgb },
            0x1B => Self::Bc2 { srgb },
            0x1C => Self::Bc3 { srgb },
            0x1D => Self::Bc4 { signed },
            0x1E => Self::Bc5 { signed },
            0x1F => match variant {
                0x05 => Self::Bc6h { signed: true },
                0x0A => Self::Bc6h { signed: false },
                _ => return Err(Error::UnknownPixelFormat(format)),
            },
            0x20 => Self::Bc7 { srgb },
            0x2D..=0x3A => {
                let (block_width, block_height) = ASTC_BLOCKS[(kind - 0x2D) as usize];
                Self::Astc {
                    block_width,
                    block_height,
                    srgb,
                }
            }
            _ => return Err(Error::UnknownPixelFormat(format)),
        })
    }

    /// Block footprint in pixels (`1x1` for uncompressed formats).
    #[must_use]
    pub fn block_dimensions(self) -> (u32, u32) {
        match self {
            Self::Bc1 { .. }
            | Self::Bc2 { .. }
            | Self::Bc3 { .. }
            | Self::Bc4 { .. }
            | Self::Bc5 { .. }
            | Self::Bc6h { .. }
            | Self::Bc7 { .. } => (4, 4),
            Self::Astc {
                block_width,
                block_height,
                ..
            } => (block_width, block_height),
            _ => (1, 1),
        }
    }

    /// Bytes per block (per pixel for uncompressed formats).
    #[must_use]
    pub fn bytes_per_block(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::R4G4B4A4 | Self::R5G6B5 | Self::R8G8 | Self::R16 => 2,
            Self::R8G8B8A8 { .. } | Self::B8G8R8A8 { .. } | Self::R10G10B10A2 => 4,
            Self::Bc1 { .. } | Self::Bc4 { .. } => 8,
            Self::Bc2 { .. }
            | Self::Bc3 { .. }
            | Self::Bc5 { .. }
            | Self::Bc6h { .. }
            | Self::Bc7 { .. }
            | Self::Astc { .. } => 16,
        }
    }

    #[must_use]
    pub fn is_block_compressed(self) -> bool {
        self.block_dimensions() != (1, 1)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::R8 => "R8",
            Self::R4G4B4A4 => "R4G4B4A4",
            Self::R5G6B5 => "R5G6B5",
            Self::R8G8 => "R8G8",
            Self::R16 => "R16",
            Self::R8G8B8A8 { .. } => "R8G8B8A8",
            Self::B8G8R8A8 { .. } => "B8G8R8A8",
            Self::R10G10B10A2 => "R10G10B10A2",
            Self::Bc1 { .. } => "BC1",
            Self::Bc2 { .. } => "BC2",
            Self::Bc3 { .. } => "BC3",
            Self::Bc4 { .. } => "BC4",
            Self::Bc5 { .. } => "BC5",
            Self::Bc6h { signed: true } => "BC6H_SF16",
            Self::Bc6h { signed: false } => "BC6H_UF16",
            Self::Bc7 { .. } => "BC7",
            Self::Astc { .. } => "ASTC",
        }
    }
}
