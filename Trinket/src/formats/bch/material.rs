//! BCH material records.

use glam::Vec2;

use crate::error::Result;
use crate::scene::{Material, TextureCoordinator, TextureMapper, TextureWrap};
use crate::utils::ByteReader;

/// Material record size before the mapper block moved out of line.
const MATERIAL_STRIDE_INLINE: usize = 0x58;
const MATERIAL_STRIDE: usize = 0x2C;
const INLINE_MAPPER_SIZE: usize = 0x30;

/// Compatibility value from which mappers are stored out of line.
const OUT_OF_LINE_MAPPERS: u8 = 0x21;

#[must_use]
pub fn material_stride(backward_compatibility: u8) -> usize {
    if backward_compatibility < OUT_OF_LINE_MAPPERS {
        MATERIAL_STRIDE_INLINE
    } else {
        MATERIAL_STRIDE
    }
}

fn read_coordinator(reader: &mut ByteReader<'_>) -> Result<TextureCoordinator> {
    let projection_and_camera = reader.read_u32()?;
    Ok(TextureCoordinator {
        projection: (projection_and_camera >> 16) & 0xFF,
        reference_camera: projection_and_camera >> 24,
        scale: Vec2::new(reader.read_f32()?, reader.read_f32()?),
        rotate: reader.read_f32()?,
        translate: Vec2::new(reader.read_f32()?, reader.read_f32()?),
    })
}

fn read_mapper(reader: &mut ByteReader<'_>) -> Result<TextureMapper> {
    let wrap_and_mag = reader.read_u32()?;
    let lod_and_min = reader.read_u32()?;
    let lod_bias = reader.read_f32()?;
    let border = reader.read_bytes(4)?;
    Ok(TextureMapper {
        wrap_u: TextureWrap::from_u32((wrap_and_mag >> 8) & 0xFF),
        wrap_v: TextureWrap::from_u32((wrap_and_mag >> 16) & 0xFF),
        mag_filter: wrap_and_mag >> 24,
        min_filter: lod_and_min & 0xFF,
        lod_bias,
        border_color: [border[0], border[1], border[2], border[3]],
    })
}

/// Read material `index` of the table at `table_offset`.
///
/// Coordinators keep their unit scale unless the record points at a
/// parameter block.
///
/// # Errors
/// Returns [`crate::Error::UnexpectedEof`] if the record or one of its
/// sub-blocks is truncated.
pub fn read_material(
    data: &[u8],
    table_offset: usize,
    index: usize,
    backward_compatibility: u8,
) -> Result<Material> {
    let mut reader =
        ByteReader::at(data, table_offset + index * material_stride(backward_compatibility));

    let parameters_offset = reader.read_u32()? as usize;
    reader.skip(12);
    let _texture_commands_offset = reader.read_u32()?;
    let _texture_commands_words = reader.read_u32()?;

    let mapper_offset = if backward_compatibility < OUT_OF_LINE_MAPPERS {
        let inline = reader.position();
        reader.skip(INLINE_MAPPER_SIZE);
        inline
    } else {
        reader.read_u32()? as usize
    };

    let texture0 = reader.read_string_ptr()?;
    let texture1 = reader.read_string_ptr()?;
    let texture2 = reader.read_string_ptr()?;
    let name = reader.read_string_ptr()?;

    let mut material = Material::new(name);
    material.textures = [texture0, texture1, texture2];

    if parameters_offset != 0 {
        let mut params = ByteReader::at(data, parameters_offset);
        let _hash = params.read_u32()?;
        let _material_flags = params.read_u16()?;
        let _fragment_flags = params.read_u16()?;
        params.skip(4);
        for coordinator in &mut material.coordinators {
            *coordinator = read_coordinator(&mut params)?;
        }
    }

    if mapper_offset != 0 {
        let mut mappers = ByteReader::at(data, mapper_offset);
        for mapper in &mut material.mappers {
            *mapper = read_mapper(&mut mappers)?;
        }
    }

    Ok(material)
}
