//! Pointer relocation.
//!
//! Offsets stored in a BCH file are relative to the section they point into.
//! Each relocation record names one 32-bit word and the section base to add
//! to it; after the pass every pointer is an absolute file offset.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use super::header::BchHeader;
use crate::error::{Error, Result};

/// One packed relocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEntry {
    /// Low 25 bits. Word index for most flags, byte offset for flag 1.
    pub offset: u32,
    /// High 7 bits.
    pub flag: u8,
}

impl RelocationEntry {
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        Self {
            offset: value & 0x01FF_FFFF,
            flag: (value >> 25) as u8,
        }
    }
}

/// How a GPU-section relocation rewrites its target word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GpuPatch {
    /// Add the base.
    Add(u32),
    /// Add the base and set the high bit (16-bit index buffer).
    AddShortIndex(u32),
    /// Add the base and clear the high bit (8-bit index buffer).
    AddByteIndex(u32),
}

impl GpuPatch {
    fn apply(self, value: u32) -> u32 {
        match self {
            Self::Add(base) => value.wrapping_add(base),
            Self::AddShortIndex(base) => (value.wrapping_add(base) & 0x7FFF_FFFF) | 0x8000_0000,
            Self::AddByteIndex(base) => value.wrapping_add(base) & 0x7FFF_FFFF,
        }
    }
}

/// Patch for a flag in the main-header table, as `(target, base)`.
fn main_patch(header: &BchHeader, entry: RelocationEntry) -> Option<(usize, u32)> {
    let word = entry.offset as usize * 4 + header.main_header_offset as usize;
    match entry.flag {
        0 => Some((word, header.main_header_offset)),
        1 => Some((
            entry.offset as usize + header.main_header_offset as usize,
            header.string_table_offset,
        )),
        2 => Some((word, header.gpu_commands_offset)),
        7 | 0x0C => Some((word, header.data_offset)),
        _ => None,
    }
}

/// Patch for a flag in the GPU-commands table. The mapping shifts with the
/// backward-compatibility byte.
fn gpu_patch(header: &BchHeader, flag: u8) -> Option<GpuPatch> {
    let data = header.data_offset;
    let extended = header.data_extended_offset;
    let bc = header.backward_compatibility;

    if bc < 6 {
        match flag {
            0x23 | 0x25 => Some(GpuPatch::Add(data)),
            0x26 => Some(GpuPatch::AddShortIndex(data)),
            0x27 => Some(GpuPatch::AddByteIndex(data)),
            _ => None,
        }
    } else if bc < 8 {
        match flag {
            0x24 | 0x26 => Some(GpuPatch::Add(data)),
            0x27 => Some(GpuPatch::AddShortIndex(data)),
            0x28 => Some(GpuPatch::AddByteIndex(data)),
            _ => None,
        }
    } else if bc < 0x21 {
        match flag {
            0x25 | 0x26 => Some(GpuPatch::Add(data)),
            0x27 => Some(GpuPatch::AddShortIndex(data)),
            0x28 => Some(GpuPatch::AddByteIndex(data)),
            _ => None,
        }
    } else {
        match flag {
            0x25 | 0x26 => Some(GpuPatch::Add(data)),
            0x27 => Some(GpuPatch::AddShortIndex(data)),
            0x28 => Some(GpuPatch::AddByteIndex(data)),
            0x2B => Some(GpuPatch::Add(extended)),
            0x2C => Some(GpuPatch::AddShortIndex(extended)),
            0x2D => Some(GpuPatch::AddByteIndex(extended)),
            _ => None,
        }
    }
}

fn patch_word(data: &mut [u8], target: usize, f: impl FnOnce(u32) -> u32) -> Result<()> {
    let word = target
        .checked_add(4)
        .and_then(|end| data.get_mut(target..end))
        .ok_or(Error::UnexpectedEof {
            offset: target,
            needed: 4,
        })?;
    let value = LittleEndian::read_u32(word);
    LittleEndian::write_u32(word, f(value));
    Ok(())
}

/// Apply every relocation record to `data`, consuming the unrelocated buffer.
///
/// Records are processed in file order. Flags with no mapping are skipped.
///
/// # Errors
/// Returns [`Error::UnexpectedEof`] if the table or a patch target lies
/// outside the buffer.
pub fn relocate(header: &BchHeader, mut data: Vec<u8>) -> Result<Vec<u8>> {
    let table_start = header.relocation_table_offset as usize;
    let table_end = table_start + header.relocation_table_length as usize;
    if table_end > data.len() {
        return Err(Error::UnexpectedEof {
            offset: table_start,
            needed: header.relocation_table_length as usize,
        });
    }

    let mut patched = 0usize;
    let mut skipped = 0usize;
    for pos in (table_start..table_end).step_by(4) {
        if pos + 4 > table_end {
            break;
        }
        let entry = RelocationEntry::from_u32(LittleEndian::read_u32(&data[pos..pos + 4]));
        let mut handled = false;

        if let Some((target, base)) = main_patch(header, entry) {
            patch_word(&mut data, target, |v| v.wrapping_add(base))?;
            handled = true;
        }

        if let Some(patch) = gpu_patch(header, entry.flag) {
            let target = entry.offset as usize * 4 + header.gpu_commands_offset as usize;
            patch_word(&mut data, target, |v| patch.apply(v))?;
            handled = true;
        }

        if handled {
            patched += 1;
        } else {
            skipped += 1;
        }
    }

    debug!(patched, skipped, "Applied BCH relocation table");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bc: u8) -> BchHeader {
        BchHeader {
            backward_compatibility: bc,
            main_header_offset: 0x10,
            string_table_offset: 0x100,
            gpu_commands_offset: 0x20,
            data_offset: 0x1000,
            data_extended_offset: 0x2000,
            relocation_table_offset: 0x40,
            ..BchHeader::default()
        }
    }

    fn buffer_with_entries(entries: &[u32]) -> Vec<u8> {
        let mut data = vec![0u8; 0x40];
        for e in entries {
            data.extend_from_slice(&e.to_le_bytes());
        }
        data
    }

    fn word(data: &[u8], offset: usize) -> u32 {
        LittleEndian::read_u32(&data[offset..offset + 4])
    }

    #[test]
    fn test_entry_unpacking() {
        let entry = RelocationEntry::from_u32((0x0C << 25) | 0x01AB_CDEF);
        assert_eq!(entry.flag, 0x0C);
        assert_eq!(entry.offset, 0x01AB_CDEF);
    }

    #[test]
    fn test_string_table_flag_is_byte_addressed() {
        let mut h = header(0x20);
        let mut data = buffer_with_entries(&[(1 << 25) | 2]);
        h.relocation_table_length = 4;
        // target = 2 + main header offset
        LittleEndian::write_u32(&mut data[0x12..0x16], 0x34);

        let data = relocate(&h, data).unwrap();
        assert_eq!(word(&data, 0x12), 0x34 + 0x100);
    }

    #[test]
    fn test_word_addressed_flags() {
        let mut h = header(0x20);
        let mut data = buffer_with_entries(&[1, (2 << 25) | 2, (7 << 25) | 3]);
        h.relocation_table_length = 12;
        LittleEndian::write_u32(&mut data[0x14..0x18], 5);
        LittleEndian::write_u32(&mut data[0x18..0x1C], 6);
        LittleEndian::write_u32(&mut data[0x1C..0x20], 7);

        let data = relocate(&h, data).unwrap();
        assert_eq!(word(&data, 0x14), 5 + 0x10);
        assert_eq!(word(&data, 0x18), 6 + 0x20);
        assert_eq!(word(&data, 0x1C), 7 + 0x1000);
    }

    #[test]
    fn test_gpu_index_flags_set_and_clear_high_bit() {
        let mut h = header(0x21);
        let mut data = buffer_with_entries(&[0x27 << 25, (0x28 << 25) | 1, (0x2B << 25) | 2]);
        h.relocation_table_length = 12;
        LittleEndian::write_u32(&mut data[0x20..0x24], 0x10);
        LittleEndian::write_u32(&mut data[0x24..0x28], 0x8000_0010);
        LittleEndian::write_u32(&mut data[0x28..0x2C], 0x30);

        let data = relocate(&h, data).unwrap();
        assert_eq!(word(&data, 0x20), 0x8000_1010);
        assert_eq!(word(&data, 0x24), 0x1010);
        assert_eq!(word(&data, 0x28), 0x2030);
    }

    #[test]
    fn test_gpu_table_depends_on_compatibility() {
        // 0x23 is a texture pointer only in the oldest layout
        for (bc, expected) in [(5u8, 0x1004u32), (6, 4), (0x20, 4)] {
            let mut h = header(bc);
            let mut data = buffer_with_entries(&[0x23 << 25]);
            h.relocation_table_length = 4;
            LittleEndian::write_u32(&mut data[0x20..0x24], 4);
            let data = relocate(&h, data).unwrap();
            assert_eq!(word(&data, 0x20), expected, "bc = {bc}");
        }
    }

    #[test]
    fn test_unknown_flags_are_skipped() {
        let mut h = header(0x20);
        let mut data = buffer_with_entries(&[(0x50 << 25) | 1]);
        h.relocation_table_length = 4;
        LittleEndian::write_u32(&mut data[0x14..0x18], 9);
        let data = relocate(&h, data).unwrap();
        assert_eq!(word(&data, 0x14), 9);
    }

    #[test]
    fn test_patch_outside_buffer_fails() {
        let mut h = header(0x20);
        let data = buffer_with_entries(&[0x1000]);
        h.relocation_table_length = 4;
        assert!(matches!(
            relocate(&h, data),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
