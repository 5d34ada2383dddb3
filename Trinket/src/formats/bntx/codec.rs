//! Untiled surface to RGBA8 conversion.
//!
//! Uncompressed formats are converted channel by channel. BC6H goes through
//! an injected [`Bc6hDecoder`]; the other block formats produce a solid
//! placeholder so a texture with an unsupported format still exports.

use std::sync::Arc;

use tracing::error;

use super::format::PixelFormat;
use crate::error::{Error, Result};

/// Fill for block formats without a decoder.
pub const PLACEHOLDER_GRAY: [u8; 4] = [128, 128, 128, 255];
/// Fill for BC6H when no decoder was registered.
pub const MISSING_BC6H_DECODER: [u8; 4] = [255, 0, 255, 255];
/// Fill for BC6H when the decoder failed.
pub const FAILED_BC6H_DECODE: [u8; 4] = [255, 0, 0, 255];

/// Decodes BC6H (HDR) block data into RGBA8.
pub trait Bc6hDecoder: Send + Sync {
    /// Decode `data` (row-major 16-byte blocks) into `width * height * 4`
    /// bytes of RGBA8.
    ///
    /// # Errors
    /// Implementations return [`Error::Bc6hDecodeFailed`] when the block data
    /// cannot be decoded.
    fn decode(&self, data: &[u8], width: u32, height: u32, signed: bool) -> Result<Vec<u8>>;
}

/// [`Bc6hDecoder`] backed by `bcdec_rs`, tone mapped by clamping to `0..=1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcdecBc6hDecoder;

impl Bc6hDecoder for BcdecBc6hDecoder {
    fn decode(&self, data: &[u8], width: u32, height: u32, signed: bool) -> Result<Vec<u8>> {
        const BLOCK_SIZE: usize = 16;

        let width = width as usize;
        let height = height as usize;
        let blocks_x = width.div_ceil(4);
        let blocks_y = height.div_ceil(4);
        let needed = blocks_x * blocks_y * BLOCK_SIZE;
        if data.len() < needed {
            return Err(Error::Bc6hDecodeFailed {
                message: format!("{} bytes of block data, {needed} needed", data.len()),
            });
        }

        let mut rgba = vec![0u8; width * height * 4];
        // 4x4 RGB floats
        let mut block_rgb = [0f32; 48];
        let block_pitch = 12;

        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let block_idx = (by * blocks_x + bx) * BLOCK_SIZE;
                let block = &data[block_idx..block_idx + BLOCK_SIZE];
                bcdec_rs::bc6h_float(block, &mut block_rgb, block_pitch, signed);

                for py in 0..4 {
                    for px in 0..4 {
                        let x = bx * 4 + px;
                        let y = by * 4 + py;
                        if x >= width || y >= height {
                            continue;
                        }
                        let src = py * block_pitch + px * 3;
                        let dst = (y * width + x) * 4;
                        for c in 0..3 {
                            rgba[dst + c] = to_unorm8(block_rgb[src + c]);
                        }
                        rgba[dst + 3] = 255;
                    }
                }
            }
        }
        Ok(rgba)
    }
}

fn to_unorm8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Output of one surface conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPixels {
    /// `width * height * 4` bytes.
    pub rgba: Vec<u8>,
    /// Set when the pixels are a placeholder.
    pub warning: Option<String>,
}

impl DecodedPixels {
    fn decoded(rgba: Vec<u8>) -> Self {
        Self {
            rgba,
            warning: None,
        }
    }

    fn filled(color: [u8; 4], width: u32, height: u32, warning: String) -> Self {
        Self {
            rgba: solid(color, width, height),
            warning: Some(warning),
        }
    }
}

fn solid(color: [u8; 4], width: u32, height: u32) -> Vec<u8> {
    color.repeat(width as usize * height as usize)
}

/// Converts untiled surfaces into RGBA8.
#[derive(Clone, Default)]
pub struct TextureCodec {
    bc6h: Option<Arc<dyn Bc6hDecoder>>,
}

impl std::fmt::Debug for TextureCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCodec")
            .field("bc6h", &self.bc6h.is_some())
            .finish()
    }
}

impl TextureCodec {
    /// A codec without a BC6H decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bc6h_decoder(mut self, decoder: Arc<dyn Bc6hDecoder>) -> Self {
        self.bc6h = Some(decoder);
        self
    }

    #[must_use]
    pub fn has_bc6h_decoder(&self) -> bool {
        self.bc6h.is_some()
    }

    /// Convert one untiled slice of `format` into RGBA8.
    ///
    /// `data` holds the surface as a row-major grid of pixels (or blocks).
    /// Missing trailing bytes read as zero.
    #[must_use]
    pub fn decode(&self, format: PixelFormat, data: &[u8], width: u32, height: u32) -> DecodedPixels {
        match format {
            PixelFormat::Bc6h { signed } => self.decode_bc6h(data, width, height, signed),
            PixelFormat::Bc1 { .. }
            | PixelFormat::Bc2 { .. }
            | PixelFormat::Bc3 { .. }
            | PixelFormat::Bc4 { .. }
            | PixelFormat::Bc5 { .. }
            | PixelFormat::Bc7 { .. }
            | PixelFormat::Astc { .. } => DecodedPixels::filled(
                PLACEHOLDER_GRAY,
                width,
                height,
                format!("{} is not decoded; wrote a gray placeholder", format.name()),
            ),
            _ => DecodedPixels::decoded(convert_uncompressed(format, data, width, height)),
        }
    }

    fn decode_bc6h(&self, data: &[u8], width: u32, height: u32, signed: bool) -> DecodedPixels {
        let Some(decoder) = &self.bc6h else {
            return DecodedPixels::filled(
                MISSING_BC6H_DECODER,
                width,
                height,
                "no BC6H decoder registered; wrote a magenta placeholder".to_string(),
            );
        };

        match decoder.decode(data, width, height, signed) {
            Ok(rgba) if rgba.len() == width as usize * height as usize * 4 => {
                DecodedPixels::decoded(rgba)
            }
            Ok(rgba) => {
                error!(
                    "BC6H decoder returned {} bytes for {width}x{height}",
                    rgba.len()
                );
                DecodedPixels::filled(
                    FAILED_BC6H_DECODE,
                    width,
                    height,
                    "BC6H decoder returned a wrongly sized image".to_string(),
                )
            }
            Err(e) => {
                error!("BC6H decode failed: {e}");
                DecodedPixels::filled(
                    FAILED_BC6H_DECODE,
                    width,
                    height,
                    format!("BC6H decode failed: {e}"),
                )
            }
        }
    }
}

fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

fn expand6(v: u16) -> u8 {
    let v = (v & 0x3F) as u8;
    (v << 2) | (v >> 4)
}

fn convert_uncompressed(format: PixelFormat, data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let bpp = format.bytes_per_block() as usize;
    let mut rgba = Vec::with_capacity(pixels * 4);

    let mut texel = [0u8; 4];
    for i in 0..pixels {
        texel.fill(0);
        if let Some(src) = data.get(i * bpp..(i + 1) * bpp) {
            texel[..bpp].copy_from_slice(src);
        }
        let half = u16::from_le_bytes([texel[0], texel[1]]);
        let word = u32::from_le_bytes(texel);

        let out = match format {
            PixelFormat::R8 => [texel[0], texel[0], texel[0], 255],
            PixelFormat::R4G4B4A4 => {
                let nibble = |shift: u16| ((half >> shift) & 0xF) as u8 * 17;
                [nibble(0), nibble(4), nibble(8), nibble(12)]
            }
            PixelFormat::R5G6B5 => [expand5(half), expand6(half >> 5), expand5(half >> 11), 255],
            PixelFormat::R8G8 => [texel[0], texel[1], 0, 255],
            PixelFormat::R16 => {
                let v = (half >> 8) as u8;
                [v, v, v, 255]
            }
            PixelFormat::B8G8R8A8 { .. } => [texel[2], texel[1], texel[0], texel[3]],
            PixelFormat::R10G10B10A2 => {
                let ten_to_eight = |shift: u32| (((word >> shift) & 0x3FF) >> 2) as u8;
                [
                    ten_to_eight(0),
                    ten_to_eight(10),
                    ten_to_eight(20),
                    ((word >> 30) as u8) * 85,
                ]
            }
            _ => texel,
        };
        rgba.extend_from_slice(&out);
    }
    rgba
}
