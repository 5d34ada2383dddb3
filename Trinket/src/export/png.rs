//! RGBA8 to PNG.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageBuffer, RgbaImage};

use crate::error::{Error, Result};

/// Writes RGBA8 pixel buffers as PNG files.
pub trait PngEncoder {
    /// Encode `rgba` (`width * height * 4` bytes) to `path`.
    fn encode(&self, rgba: &[u8], width: u32, height: u32, path: &Path) -> Result<()>;
}

/// [`PngEncoder`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePngEncoder;

/// Encode RGBA8 pixels to PNG bytes.
///
/// # Errors
/// Returns [`Error::PngEncodeFailed`] if the buffer does not match the
/// dimensions or encoding fails.
pub fn rgba_to_png_bytes(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let img: RgbaImage =
        ImageBuffer::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
            Error::PngEncodeFailed {
                message: format!(
                    "{} bytes do not form a {width}x{height} RGBA image",
                    rgba.len()
                ),
            }
        })?;

    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
    img.write_with_encoder(encoder)?;
    Ok(png_data)
}

impl PngEncoder for ImagePngEncoder {
    fn encode(&self, rgba: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
        let png_data = rgba_to_png_bytes(rgba, width, height)?;
        let mut output = BufWriter::new(File::create(path)?);
        output.write_all(&png_data)?;
        output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_encode_writes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tex.png");
        let rgba = [255u8, 0, 0, 255].repeat(4);

        ImagePngEncoder.encode(&rgba, 2, 2, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(
            rgba_to_png_bytes(&[0; 12], 2, 2),
            Err(Error::PngEncodeFailed { .. })
        ));
    }
}
