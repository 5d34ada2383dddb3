//! BNTX (Switch) texture container.
//!
//! A BNTX file holds a texture dictionary (`_DIC`) pointing at `BRTI`
//! records. Each record's surface is untiled with [`deswizzle`] and converted
//! to RGBA8 by a [`TextureCodec`]. Only mip 0 of the first array slice is
//! decoded.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trinket::formats::bntx::{self, BcdecBc6hDecoder, TextureCodec};
//!
//! let bytes = std::fs::read("body_col.bntx")?;
//! let codec = TextureCodec::new().with_bc6h_decoder(Arc::new(BcdecBc6hDecoder));
//! let result = bntx::decode(&bytes, &codec)?;
//! for texture in &result.textures {
//!     println!("{} {}x{}", texture.name, texture.width, texture.height);
//! }
//! # Ok::<(), trinket::Error>(())
//! ```

pub mod codec;
pub mod deswizzle;
pub mod format;

use tracing::{debug, info, warn};

pub use codec::{BcdecBc6hDecoder, Bc6hDecoder, DecodedPixels, TextureCodec};
pub use deswizzle::{SurfaceLayout, TileMode, deswizzle};
pub use format::PixelFormat;

use crate::error::{Error, Result};
use crate::utils::ByteReader;
use crate::utils::reader::check_table;

pub const BNTX_MAGIC: [u8; 4] = *b"BNTX";
pub const DICTIONARY_MAGIC: [u8; 4] = *b"_DIC";
pub const TEXTURE_MAGIC: [u8; 4] = *b"BRTI";

/// Fixed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BntxHeader {
    pub data_block_count: u16,
    pub platform: [u8; 4],
    pub dictionary_offset: u32,
}

impl BntxHeader {
    /// # Errors
    /// Returns [`Error::InvalidBntxMagic`] if the file does not start with
    /// `BNTX`, or [`Error::UnexpectedEof`] if the header is truncated.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let magic = reader.read_magic()?;
        if magic != BNTX_MAGIC {
            return Err(Error::InvalidBntxMagic(magic));
        }
        // version, byte order mark, header size, file size
        reader.skip(0x0C);
        let data_block_count = reader.read_u16()?;
        reader.skip(2);
        let platform = reader.read_magic()?;
        let dictionary_offset = reader.read_u32()?;
        Ok(Self {
            data_block_count,
            platform,
            dictionary_offset,
        })
    }
}

/// One `BRTI` texture record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub name: String,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_length: u32,
    pub mip_count: u32,
    pub format: u32,
    pub access_flags: u32,
    pub data_offset: u32,
}

impl TextureInfo {
    /// Read the record at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTextureRecord`] if the record magic is wrong.
    pub fn read(data: &[u8], offset: usize) -> Result<Self> {
        let mut reader = ByteReader::at(data, offset);
        let magic = reader.read_magic()?;
        if magic != TEXTURE_MAGIC {
            return Err(Error::InvalidTextureRecord {
                offset,
                found: magic,
            });
        }

        let _header_size = reader.read_u32()?;
        let flags = reader.read_u32()?;
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let depth = reader.read_u32()?;
        let array_length = reader.read_u32()?;
        let mip_count = reader.read_u32()?;
        let format = reader.read_u32()?;
        let access_flags = reader.read_u32()?;
        let data_offset = reader.read_u32()?;
        let name_offset = reader.read_u32()? as usize;

        let mut name_reader = ByteReader::at(data, name_offset);
        let name_len = usize::from(name_reader.read_u16()?);
        let name = String::from_utf8_lossy(name_reader.read_bytes(name_len)?).into_owned();

        Ok(Self {
            name,
            flags,
            width,
            height,
            depth,
            array_length,
            mip_count,
            format,
            access_flags,
            data_offset,
        })
    }

    #[must_use]
    pub fn tile_mode(&self) -> TileMode {
        TileMode::from_flags(self.flags)
    }

    #[must_use]
    pub fn round_pitch(&self) -> bool {
        self.flags & 0x4 != 0
    }

    #[must_use]
    pub fn block_height_log2(&self) -> u32 {
        (self.flags >> 8) & 0xF
    }

    /// Surface geometry of mip 0 in `format`.
    #[must_use]
    pub fn surface_layout(&self, format: PixelFormat) -> SurfaceLayout {
        let (block_width, block_height) = format.block_dimensions();
        SurfaceLayout {
            width: self.width,
            height: self.height,
            depth: self.depth.max(1),
            block_width,
            block_height,
            bytes_per_block: format.bytes_per_block(),
            tile_mode: self.tile_mode(),
            round_pitch: self.round_pitch(),
            block_height_log2: self.block_height_log2(),
        }
    }
}

/// A texture converted to RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_count: u32,
    /// `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

/// Result of decoding one BNTX file.
#[derive(Debug, Clone, Default)]
pub struct BntxDecodeResult {
    pub textures: Vec<DecodedTexture>,
    /// Placeholder fills, skipped records and dictionary problems.
    pub warnings: Vec<String>,
}

/// Read the header and every texture record the dictionary points at.
///
/// A dictionary with the wrong magic, or with more entries than the file
/// can hold, yields no records and one warning.
/// Records that fail to parse are skipped with a warning.
///
/// # Errors
/// Returns an error only if the file header itself is invalid.
pub fn read_textures(data: &[u8]) -> Result<(Vec<TextureInfo>, Vec<String>)> {
    let header = BntxHeader::read(data)?;
    let mut warnings = Vec::new();

    let mut dictionary = ByteReader::at(data, header.dictionary_offset as usize);
    let magic = match dictionary.read_magic() {
        Ok(magic) => magic,
        Err(e) => {
            warn!("BNTX dictionary unreadable: {e}");
            warnings.push(format!("texture dictionary unreadable: {e}"));
            return Ok((Vec::new(), warnings));
        }
    };
    if magic != DICTIONARY_MAGIC {
        warn!(
            "BNTX dictionary magic mismatch at 0x{:x}: {:?}",
            header.dictionary_offset, magic
        );
        warnings.push(format!(
            "texture dictionary magic mismatch: expected _DIC, found {}",
            String::from_utf8_lossy(&magic)
        ));
        return Ok((Vec::new(), warnings));
    }

    let _size = dictionary.read_u32()?;
    let count = dictionary.read_u32()?;
    debug!(count, platform = ?header.platform, "Reading BNTX dictionary");

    if let Err(e) = check_table(data, dictionary.position(), count as usize, 4) {
        warn!("BNTX dictionary count {count} exceeds the file: {e}");
        warnings.push(format!("texture dictionary lists {count} entries: {e}"));
        return Ok((Vec::new(), warnings));
    }

    let mut textures = Vec::new();
    for index in 0..count {
        let record = dictionary
            .read_u32()
            .and_then(|offset| TextureInfo::read(data, offset as usize));
        match record {
            Ok(info) => textures.push(info),
            Err(e) => {
                warn!("Skipping BNTX texture {index}: {e}");
                warnings.push(format!("texture {index}: {e}"));
            }
        }
    }
    Ok((textures, warnings))
}

/// Untile and convert mip 0 of one texture.
///
/// # Errors
/// Returns an error for unknown pixel formats or zero-sized surfaces.
pub fn decode_texture(
    data: &[u8],
    info: &TextureInfo,
    codec: &TextureCodec,
) -> Result<(DecodedTexture, Option<String>)> {
    let format = PixelFormat::from_u32(info.format)?;
    let layout = info.surface_layout(format);
    let surface = data.get(info.data_offset as usize..).unwrap_or_default();

    let mut untiled = deswizzle(&layout, surface)?;
    untiled.truncate(layout.slice_size());

    let pixels = codec.decode(format, &untiled, info.width, info.height);
    if let Some(warning) = &pixels.warning {
        warn!("Texture '{}': {warning}", info.name);
    }
    Ok((
        DecodedTexture {
            name: info.name.clone(),
            width: info.width,
            height: info.height,
            format,
            mip_count: info.mip_count,
            rgba: pixels.rgba,
        },
        pixels.warning.map(|w| format!("{}: {w}", info.name)),
    ))
}

/// Decode every texture in a BNTX file.
///
/// # Errors
/// Returns an error only if the file header is invalid; per-texture failures
/// are reported in [`BntxDecodeResult::warnings`].
pub fn decode(data: &[u8], codec: &TextureCodec) -> Result<BntxDecodeResult> {
    let (infos, warnings) = read_textures(data)?;
    let mut result = BntxDecodeResult {
        textures: Vec::with_capacity(infos.len()),
        warnings,
    };

    for info in &infos {
        match decode_texture(data, info, codec) {
            Ok((texture, warning)) => {
                info!(
                    "Decoded texture '{}' ({}x{}, {})",
                    texture.name,
                    texture.width,
                    texture.height,
                    texture.format.name()
                );
                result.warnings.extend(warning);
                result.textures.push(texture);
            }
            Err(e) => {
                warn!("Failed to decode texture '{}': {e}", info.name);
                result.warnings.push(format!("{}: {e}", info.name));
            }
        }
    }
    Ok(result)
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_dictionary_magic_mismatch_yields_warning() {
        let mut data = test_support::single_texture("tex", 0x0B01, 1, 1, &[1, 2, 3, 4]);
        data[0x20..0x24].copy_from_slice(b"XXXX");

        let result = decode(&data, &TextureCodec::new()).unwrap();
        assert!(result.textures.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("XXXX"));
    }

    #[test]
    fn test_oversized_dictionary_count_yields_warning() {
        let mut data = test_support::single_texture("tex", 0x0B01, 1, 1, &[1, 2, 3, 4]);
        data[0x28..0x2C].copy_from_slice(&u32::MAX.to_le_bytes());

        let result = decode(&data, &TextureCodec::new()).unwrap();
        assert!(result.textures.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("4294967295 entries"));
    }

    #[test]
    fn test_wrong_file_magic_is_an_error() {
        assert!(matches!(
            decode(b"BNTY\0\0\0\0", &TextureCodec::new()),
            Err(Error::InvalidBntxMagic(_))
        ));
    }

    #[test]
    fn test_decodes_pitch_linear_rgba() {
        let pixels: Vec<u8> = (0..16).collect();
        let data = test_support::single_texture("body_col", 0x0B01, 2, 2, &pixels);

        let result = decode(&data, &TextureCodec::new()).unwrap();
        assert!(result.warnings.is_empty());
        let texture = &result.textures[0];
        assert_eq!(texture.name, "body_col");
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.rgba, pixels);
    }

    #[test]
    fn test_placeholder_warning_is_reported() {
        let data = test_support::single_texture("hdr", 0x1F0A, 4, 4, &[0; 16]);
        let result = decode(&data, &TextureCodec::new()).unwrap();
        assert_eq!(result.textures[0].rgba.len(), 4 * 4 * 4);
        assert_eq!(&result.textures[0].rgba[..4], &[255, 0, 255, 255]);
        assert!(result.warnings[0].starts_with("hdr:"));
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let mut data = test_support::single_texture("tex", 0x0B01, 1, 1, &[0; 4]);
        data[0x40..0x44].copy_from_slice(b"NOPE");
        let result = decode(&data, &TextureCodec::new()).unwrap();
        assert!(result.textures.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_record_flags() {
        let info = TextureInfo {
            name: String::new(),
            flags: 0x0405,
            width: 1,
            height: 1,
            depth: 1,
            array_length: 1,
            mip_count: 1,
            format: 0x0B01,
            access_flags: 0,
            data_offset: 0,
        };
        assert_eq!(info.tile_mode(), TileMode::PitchLinear);
        assert!(info.round_pitch());
        assert_eq!(info.block_height_log2(), 4);
    }
}
