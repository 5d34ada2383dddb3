//! Bounds-checked little-endian reader over a byte slice.
//!
//! All format parsers in this crate read through [`ByteReader`] so a truncated
//! or corrupt file surfaces as [`Error::UnexpectedEof`] instead of a panic.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, count: usize) {
        self.pos = self.pos.saturating_add(count);
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `count` bytes and advance.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let slice = slice_at(self.data, self.pos, count)?;
        self.pos += count;
        Ok(slice)
    }

    pub fn read_magic(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read a `u32` pointer and return the null-terminated string it points to,
    /// leaving the cursor just past the pointer.
    pub fn read_string_ptr(&mut self) -> Result<String> {
        let offset = self.read_u32()? as usize;
        cstring_at(self.data, offset)
    }
}

/// Borrow `count` bytes at `offset`, or fail with [`Error::UnexpectedEof`].
pub fn slice_at(data: &[u8], offset: usize, count: usize) -> Result<&[u8]> {
    offset
        .checked_add(count)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::UnexpectedEof {
            offset,
            needed: count,
        })
}

/// Check that `count` records of `stride` bytes starting at `offset` lie
/// inside `data`. Call this before looping over a count read from the file.
pub fn check_table(data: &[u8], offset: usize, count: usize, stride: usize) -> Result<()> {
    let needed = count.checked_mul(stride).ok_or(Error::UnexpectedEof {
        offset,
        needed: usize::MAX,
    })?;
    slice_at(data, offset, needed).map(|_| ())
}

pub fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(slice_at(data, offset, 2)?))
}

pub fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    Ok(LittleEndian::read_u32(slice_at(data, offset, 4)?))
}

pub fn i32_at(data: &[u8], offset: usize) -> Result<i32> {
    Ok(LittleEndian::read_i32(slice_at(data, offset, 4)?))
}

pub fn f32_at(data: &[u8], offset: usize) -> Result<f32> {
    Ok(LittleEndian::read_f32(slice_at(data, offset, 4)?))
}

/// Read a null-terminated string starting at `offset`.
///
/// An offset at or past the end of the data yields an empty string; a string
/// that runs to the end of the buffer without a terminator is returned as-is.
pub fn cstring_at(data: &[u8], offset: usize) -> Result<String> {
    if offset >= data.len() {
        return Ok(String::new());
    }
    let tail = &data[offset..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}
