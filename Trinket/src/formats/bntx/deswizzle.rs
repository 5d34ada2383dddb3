//! Tegra X1 surface deswizzling.
//!
//! Block-linear surfaces are tiled in GOBs (groups of bytes) of 64 bytes by
//! 8 rows, stacked `block_height` GOBs tall. Pitch-linear surfaces are plain
//! rows, optionally padded to 32 bytes.

use crate::error::{Error, Result};

const GOB_WIDTH_BYTES: usize = 64;
const GOB_HEIGHT: usize = 8;
const GOB_SIZE: usize = GOB_WIDTH_BYTES * GOB_HEIGHT;

/// Surface tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    BlockLinear,
    PitchLinear,
}

impl TileMode {
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        if flags & 0x3 == 1 {
            Self::PitchLinear
        } else {
            Self::BlockLinear
        }
    }
}

/// Geometry of a GPU-tiled surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub bytes_per_block: u32,
    pub tile_mode: TileMode,
    /// Round the pitch of pitch-linear surfaces up to 32 bytes.
    pub round_pitch: bool,
    /// log2 of the GOB stack height for block-linear surfaces.
    pub block_height_log2: u32,
}

impl SurfaceLayout {
    /// Width and height in blocks.
    #[must_use]
    pub fn grid(&self) -> (usize, usize) {
        (
            self.width.div_ceil(self.block_width.max(1)) as usize,
            self.height.div_ceil(self.block_height.max(1)) as usize,
        )
    }

    /// GOBs per block, `1 << clamp(log2, 0, 5)`.
    #[must_use]
    pub fn gob_block_height(&self) -> usize {
        1 << self.block_height_log2.min(5)
    }

    /// Size of the untiled output, all slices included.
    #[must_use]
    pub fn deswizzled_size(&self) -> usize {
        let (w, h) = self.grid();
        w * h * self.depth.max(1) as usize * self.bytes_per_block as usize
    }

    /// Size of one untiled slice.
    #[must_use]
    pub fn slice_size(&self) -> usize {
        let (w, h) = self.grid();
        w * h * self.bytes_per_block as usize
    }

    /// Bytes one tiled slice occupies in the source.
    fn tiled_slice_size(&self) -> usize {
        let (w, h) = self.grid();
        let bpp = self.bytes_per_block as usize;
        match self.tile_mode {
            TileMode::PitchLinear => self.pitch() * h,
            TileMode::BlockLinear => {
                let block_rows = GOB_HEIGHT * self.gob_block_height();
                (w * bpp).next_multiple_of(GOB_WIDTH_BYTES) * h.next_multiple_of(block_rows)
            }
        }
    }

    fn pitch(&self) -> usize {
        let (w, _) = self.grid();
        let pitch = w * self.bytes_per_block as usize;
        if self.round_pitch {
            pitch.next_multiple_of(32)
        } else {
            pitch
        }
    }
}

/// Byte address of block `(x, y)` inside a block-linear surface.
#[must_use]
pub fn block_linear_address(
    x: usize,
    y: usize,
    width_in_gobs: usize,
    bytes_per_block: usize,
    gob_block_height: usize,
) -> usize {
    let block_bytes = GOB_SIZE * gob_block_height;
    let x_bytes = x * bytes_per_block;

    let gob_address = (y / (GOB_HEIGHT * gob_block_height)) * block_bytes * width_in_gobs
        + (x_bytes / GOB_WIDTH_BYTES) * block_bytes
        + ((y % (GOB_HEIGHT * gob_block_height)) / GOB_HEIGHT) * GOB_SIZE;

    gob_address
        + ((x_bytes % 64) / 32) * 256
        + ((y % 8) / 2) * 64
        + ((x_bytes % 32) / 16) * 32
        + (y % 2) * 16
        + (x_bytes % 16)
}

/// Untile `data` into a row-major block grid of
/// [`SurfaceLayout::deswizzled_size`] bytes.
///
/// Source reads past the end of `data` leave zeros in the output.
///
/// # Errors
/// Returns [`Error::InvalidTextureDimensions`] for a zero-sized surface.
pub fn deswizzle(layout: &SurfaceLayout, data: &[u8]) -> Result<Vec<u8>> {
    if layout.width == 0 || layout.height == 0 || layout.bytes_per_block == 0 {
        return Err(Error::InvalidTextureDimensions {
            width: layout.width,
            height: layout.height,
            depth: layout.depth,
        });
    }

    let (width, height) = layout.grid();
    let bpp = layout.bytes_per_block as usize;
    let depth = layout.depth.max(1) as usize;
    let pitch = layout.pitch();
    let width_in_gobs = (width * bpp).div_ceil(GOB_WIDTH_BYTES);
    let gob_block_height = layout.gob_block_height();
    let tiled_slice = layout.tiled_slice_size();
    let linear_slice = layout.slice_size();

    let mut output = vec![0u8; layout.deswizzled_size()];
    for slice in 0..depth {
        let src_base = slice * tiled_slice;
        let dst_base = slice * linear_slice;
        for y in 0..height {
            for x in 0..width {
                let src = src_base
                    + match layout.tile_mode {
                        TileMode::PitchLinear => y * pitch + x * bpp,
                        TileMode::BlockLinear => {
                            block_linear_address(x, y, width_in_gobs, bpp, gob_block_height)
                        }
                    };
                let dst = dst_base + (y * width + x) * bpp;
                if let Some(block) = data.get(src..src + bpp) {
                    output[dst..dst + bpp].copy_from_slice(block);
                }
            }
        }
    }
    Ok(output)
}
