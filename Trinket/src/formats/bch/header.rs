//! BCH file header and content header.

use crate::error::{Error, Result};
use crate::utils::ByteReader;

/// Magic bytes at the start of every BCH container.
pub const BCH_MAGIC: [u8; 4] = *b"BCH\0";

/// Above this backward-compatibility value the header carries an extended
/// data section.
pub const EXTENDED_DATA_THRESHOLD: u8 = 0x20;

/// Fixed file prologue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BchHeader {
    pub backward_compatibility: u8,
    pub forward_compatibility: u8,
    pub version: u16,

    pub main_header_offset: u32,
    pub string_table_offset: u32,
    pub gpu_commands_offset: u32,
    pub data_offset: u32,
    /// Zero when [`BchHeader::has_extended_data`] is false.
    pub data_extended_offset: u32,
    pub relocation_table_offset: u32,

    pub main_header_length: u32,
    pub string_table_length: u32,
    pub gpu_commands_length: u32,
    pub data_length: u32,
    pub data_extended_length: u32,
    pub relocation_table_length: u32,
    pub uninit_data_length: u32,
    pub uninit_description_length: u32,

    pub flags: u16,
    pub address_count: u16,
}

impl BchHeader {
    /// Parse the header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBchMagic`] for non-BCH input,
    /// [`Error::UnexpectedEof`] if the header is truncated, or
    /// [`Error::BchSectionOutOfBounds`] if a section lies outside `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_magic()?;
        if magic != BCH_MAGIC {
            return Err(Error::InvalidBchMagic(magic));
        }

        let backward_compatibility = reader.read_u8()?;
        let forward_compatibility = reader.read_u8()?;
        let version = reader.read_u16()?;
        let extended = backward_compatibility > EXTENDED_DATA_THRESHOLD;

        let main_header_offset = reader.read_u32()?;
        let string_table_offset = reader.read_u32()?;
        let gpu_commands_offset = reader.read_u32()?;
        let data_offset = reader.read_u32()?;
        let data_extended_offset = if extended { reader.read_u32()? } else { 0 };
        let relocation_table_offset = reader.read_u32()?;

        let main_header_length = reader.read_u32()?;
        let string_table_length = reader.read_u32()?;
        let gpu_commands_length = reader.read_u32()?;
        let data_length = reader.read_u32()?;
        let data_extended_length = if extended { reader.read_u32()? } else { 0 };
        let relocation_table_length = reader.read_u32()?;
        let uninit_data_length = reader.read_u32()?;
        let uninit_description_length = reader.read_u32()?;

        let (flags, address_count) = if backward_compatibility > 7 {
            (reader.read_u16()?, reader.read_u16()?)
        } else {
            (0, 0)
        };

        let header = Self {
            backward_compatibility,
            forward_compatibility,
            version,
            main_header_offset,
            string_table_offset,
            gpu_commands_offset,
            data_offset,
            data_extended_offset,
            relocation_table_offset,
            main_header_length,
            string_table_length,
            gpu_commands_length,
            data_length,
            data_extended_length,
            relocation_table_length,
            uninit_data_length,
            uninit_description_length,
            flags,
            address_count,
        };
        header.check_bounds(data.len())?;
        Ok(header)
    }

    #[must_use]
    pub fn has_extended_data(&self) -> bool {
        self.backward_compatibility > EXTENDED_DATA_THRESHOLD
    }

    fn check_bounds(&self, file_len: usize) -> Result<()> {
        let sections = [
            ("main header", self.main_header_offset, self.main_header_length),
            ("string table", self.string_table_offset, self.string_table_length),
            ("gpu commands", self.gpu_commands_offset, self.gpu_commands_length),
            ("data", self.data_offset, self.data_length),
            ("extended data", self.data_extended_offset, self.data_extended_length),
            (
                "relocation table",
                self.relocation_table_offset,
                self.relocation_table_length,
            ),
        ];
        for (section, offset, length) in sections {
            let end = u64::from(offset) + u64::from(length);
            if length > 0 && end > file_len as u64 {
                return Err(Error::BchSectionOutOfBounds {
                    section,
                    offset,
                    length,
                });
            }
        }
        Ok(())
    }
}

/// `(pointer table, entry count, name trie)` triple from the content header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerTable {
    pub offset: u32,
    pub entries: u32,
    pub name_offset: u32,
}

impl PointerTable {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            offset: reader.read_u32()?,
            entries: reader.read_u32()?,
            name_offset: reader.read_u32()?,
        })
    }

    /// Absolute offset of entry `index`, read from the pointer table.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the table is truncated.
    pub fn entry_offset(&self, data: &[u8], index: usize) -> Result<usize> {
        let slot = self.offset as usize + index * 4;
        Ok(crate::utils::reader::u32_at(data, slot)? as usize)
    }
}

/// Content header at the start of the main header section (after relocation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentHeader {
    pub models: PointerTable,
    pub materials: PointerTable,
    pub shaders: PointerTable,
    pub textures: PointerTable,
    pub materials_lut: PointerTable,
    pub lights: PointerTable,
    pub cameras: PointerTable,
    pub fogs: PointerTable,
    pub skeletal_animations: PointerTable,
    pub material_animations: PointerTable,
    pub visibility_animations: PointerTable,
    pub light_animations: PointerTable,
    pub camera_animations: PointerTable,
    pub fog_animations: PointerTable,
    pub scenes: PointerTable,
}

impl ContentHeader {
    /// Read the fifteen pointer tables at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the main header is truncated.
    pub fn read(data: &[u8], offset: usize) -> Result<Self> {
        let mut reader = ByteReader::at(data, offset);
        Ok(Self {
            models: PointerTable::read(&mut reader)?,
            materials: PointerTable::read(&mut reader)?,
            shaders: PointerTable::read(&mut reader)?,
            textures: PointerTable::read(&mut reader)?,
            materials_lut: PointerTable::read(&mut reader)?,
            lights: PointerTable::read(&mut reader)?,
            cameras: PointerTable::read(&mut reader)?,
            fogs: PointerTable::read(&mut reader)?,
            skeletal_animations: PointerTable::read(&mut reader)?,
            material_animations: PointerTable::read(&mut reader)?,
            visibility_animations: PointerTable::read(&mut reader)?,
            light_animations: PointerTable::read(&mut reader)?,
            camera_animations: PointerTable::read(&mut reader)?,
            fog_animations: PointerTable::read(&mut reader)?,
            scenes: PointerTable::read(&mut reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(backward_compatibility: u8, fields: &[u32]) -> Vec<u8> {
        let mut data = Vec::from(BCH_MAGIC);
        data.push(backward_compatibility);
        data.push(0);
        data.extend_from_slice(&1u16.to_le_bytes());
        for f in fields {
            data.extend_from_slice(&f.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_rejects_bad_magic() {
        let data = b"XXXX\0\0\0\0".to_vec();
        assert!(matches!(
            BchHeader::read(&data),
            Err(Error::InvalidBchMagic(m)) if &m == b"XXXX"
        ));
    }

    #[test]
    fn test_extended_fields_only_above_threshold() {
        // offsets: main, string, gpu, data, reloc / lengths: main, string, gpu, data, reloc, uninit x2
        let mut data = header_bytes(0x20, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0; 4]);
        let header = BchHeader::read(&data).unwrap();
        assert!(!header.has_extended_data());
        assert_eq!(header.data_extended_offset, 0);

        let mut data = header_bytes(0x21, &[0x10, 0, 0, 0, 0x20, 0x30, 0, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0; 0x40]);
        let header = BchHeader::read(&data).unwrap();
        assert!(header.has_extended_data());
        assert_eq!(header.main_header_offset, 0x10);
        assert_eq!(header.data_extended_offset, 0x20);
        assert_eq!(header.relocation_table_offset, 0x30);
    }

    #[test]
    fn test_section_out_of_bounds() {
        let mut data = header_bytes(0x20, &[0x1000, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0; 4]);
        assert!(matches!(
            BchHeader::read(&data),
            Err(Error::BchSectionOutOfBounds { section: "main header", .. })
        ));
    }
}
