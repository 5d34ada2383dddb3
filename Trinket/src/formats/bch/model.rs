//! BCH model decoding.
//!
//! One model entry is decoded in a fixed sequence: header, object names,
//! materials, skeleton, then each object's vertex and face command blocks.
//! Scale propagation runs last so static-skin vertices are baked against the
//! unpropagated bind pose.

use glam::{Mat4, Vec3};
use tracing::{debug, warn};

use super::commands::{GpuCommandInterpreter, IndexBuffer, IndexFormat};
use super::header::BchHeader;
use super::material::{material_stride, read_material};
use super::names::read_names;
use super::vertex::{VertexAssembler, read_indices};
use crate::error::Result;
use crate::scene::{Bone, Mesh, SceneModel, SkeletonBuilder, SkinningMode};
use crate::utils::ByteReader;
use crate::utils::reader::{check_table, u32_at};

const OBJECT_STRIDE: usize = 0x38;
const BONE_STRIDE: usize = 0x64;
const FACE_HEADER_STRIDE: usize = 0x34;
const FACE_COMMANDS_AT: usize = 0x2C;
const IMPLICIT_FACE_STRIDE: usize = 0x1C;
const IMPLICIT_FACE_TABLE_AT: usize = 0x10;
const MAX_FACE_NODES: usize = 20;

/// Fixed-size model object header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelHeader {
    pub flags: u8,
    pub skeleton_scaling_type: u8,
    pub silhouette_material_entries: u16,
    pub transform: Mat4,
    pub materials_offset: u32,
    pub materials_entries: u32,
    pub materials_name_offset: u32,
    pub objects_offset: u32,
    pub objects_entries: u32,
    pub skeleton_offset: u32,
    pub skeleton_entries: u32,
    pub skeleton_name_offset: u32,
    pub node_visibility_offset: u32,
    pub node_count: u32,
    pub name: String,
    pub node_name_entries: u32,
    pub node_name_offset: u32,
    pub metadata_offset: u32,
}

impl ModelHeader {
    /// Read the header at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the header is truncated.
    pub fn read(data: &[u8], offset: usize, backward_compatibility: u8) -> Result<Self> {
        let mut reader = ByteReader::at(data, offset);

        let flags = reader.read_u8()?;
        let skeleton_scaling_type = reader.read_u8()?;
        let silhouette_material_entries = reader.read_u16()?;

        // 3x4, one row per four floats with translation last
        let mut rows = [0.0f32; 16];
        for value in rows.iter_mut().take(12) {
            *value = reader.read_f32()?;
        }
        rows[15] = 1.0;
        let transform = Mat4::from_cols_array(&rows).transpose();

        let materials_offset = reader.read_u32()?;
        let materials_entries = reader.read_u32()?;
        let materials_name_offset = reader.read_u32()?;
        let objects_offset = reader.read_u32()?;
        let objects_entries = reader.read_u32()?;
        reader.skip(if backward_compatibility > 6 { 0x28 } else { 0x20 });

        let skeleton_offset = reader.read_u32()?;
        let skeleton_entries = reader.read_u32()?;
        let skeleton_name_offset = reader.read_u32()?;
        let node_visibility_offset = reader.read_u32()?;
        let node_count = reader.read_u32()?;
        let name = reader.read_string_ptr()?;
        let node_name_entries = reader.read_u32()?;
        let node_name_offset = reader.read_u32()?;
        reader.skip(4);
        let metadata_offset = reader.read_u32()?;

        Ok(Self {
            flags,
            skeleton_scaling_type,
            silhouette_material_entries,
            transform,
            materials_offset,
            materials_entries,
            materials_name_offset,
            objects_offset,
            objects_entries,
            skeleton_offset,
            skeleton_entries,
            skeleton_name_offset,
            node_visibility_offset,
            node_count,
            name,
            node_name_entries,
            node_name_offset,
            metadata_offset,
        })
    }
}

/// Read one bone record.
fn read_bone(reader: &mut ByteReader<'_>) -> Result<Bone> {
    let _flags = reader.read_u32()?;
    let parent_id = i32::from(reader.read_i16()?);
    reader.skip(2);
    let scale = Vec3::from_array(reader.read_vec3()?);
    let rotation = Vec3::from_array(reader.read_vec3()?);
    let translation = Vec3::from_array(reader.read_vec3()?);
    // inverse bind matrix, recomputed from the hierarchy when exporting
    reader.skip(12 * 4);
    let name = reader.read_string_ptr()?;
    let _metadata = reader.read_u32()?;
    Ok(Bone::new(name, parent_id).with_srt(scale, rotation, translation))
}

/// One object (sub-mesh) record.
#[derive(Debug, Clone, Default, PartialEq)]
struct ObjectRecord {
    material_id: u16,
    is_silhouette: bool,
    node_id: u16,
    render_priority: u16,
    vertex_commands_offset: u32,
    vertex_commands_words: u32,
    faces_offset: u32,
    faces_entries: u32,
}

impl ObjectRecord {
    fn read(data: &[u8], offset: usize, backward_compatibility: u8) -> Result<Self> {
        let mut reader = ByteReader::at(data, offset);
        let material_id = reader.read_u16()?;
        let flags = reader.read_u16()?;
        let node_id = reader.read_u16()?;
        let render_priority = reader.read_u16()?;
        Ok(Self {
            material_id,
            // the silhouette bit means something else in this revision
            is_silhouette: backward_compatibility != 8 && flags & 1 != 0,
            node_id,
            render_priority,
            vertex_commands_offset: reader.read_u32()?,
            vertex_commands_words: reader.read_u32()?,
            faces_offset: reader.read_u32()?,
            faces_entries: reader.read_u32()?,
        })
    }
}

/// Index buffer plus the skinning state of one face group.
#[derive(Debug, Clone)]
struct FaceGroup {
    skinning: SkinningMode,
    nodes: Vec<usize>,
    indices: IndexBuffer,
}

fn read_face_groups(
    data: &[u8],
    header: &ModelHeader,
    object: &ObjectRecord,
    object_index: usize,
) -> Result<Vec<FaceGroup>> {
    if object.faces_offset == 0 || object.faces_entries == 0 {
        // Flat face table after the object records
        let at = header.objects_offset as usize
            + header.objects_entries as usize * OBJECT_STRIDE
            + object_index * IMPLICIT_FACE_STRIDE
            + IMPLICIT_FACE_TABLE_AT;
        let table = u32_at(data, at)? as usize;
        let entries = u32_at(data, at + 4)? as usize;
        check_table(data, table, entries, 8)?;
        return (0..entries)
            .map(|f| {
                Ok(FaceGroup {
                    skinning: SkinningMode::None,
                    nodes: Vec::new(),
                    indices: IndexBuffer {
                        address: u32_at(data, table + f * 8)?,
                        format: IndexFormat::Short,
                        count: u32_at(data, table + f * 8 + 4)?,
                    },
                })
            })
            .collect();
    }

    let entries = object.faces_entries as usize;
    check_table(data, object.faces_offset as usize, entries, FACE_HEADER_STRIDE)?;
    let mut groups = Vec::new();
    for f in 0..entries {
        let base = object.faces_offset as usize + f * FACE_HEADER_STRIDE;
        let mut reader = ByteReader::at(data, base);
        let skinning = SkinningMode::from_u16(reader.read_u16()?);
        let node_count = usize::from(reader.read_u16()?).min(MAX_FACE_NODES);
        let nodes = (0..node_count)
            .map(|_| reader.read_u16().map(usize::from))
            .collect::<Result<Vec<_>>>()?;

        reader.seek(base + FACE_COMMANDS_AT);
        let commands_offset = reader.read_u32()? as usize;
        let commands_words = reader.read_u32()? as usize;
        let commands = GpuCommandInterpreter::run(data, commands_offset, commands_words)?;

        groups.push(FaceGroup {
            skinning,
            nodes,
            indices: commands.index_buffer(),
        });
    }
    Ok(groups)
}

/// Material index of an object, or `None` when it points past the table.
fn resolve_material(
    material_id: u16,
    material_count: usize,
    object_index: usize,
) -> Option<usize> {
    let id = usize::from(material_id);
    if id < material_count {
        Some(id)
    } else {
        warn!(
            object_index,
            "Object references material {id} of {material_count}; leaving it unassigned"
        );
        None
    }
}

/// Decode the model at `offset`.
///
/// # Errors
/// Returns an error if any record of the model is truncated or inconsistent.
pub fn decode_model(data: &[u8], header: &BchHeader, offset: usize) -> Result<SceneModel> {
    let bc = header.backward_compatibility;
    let model_header = ModelHeader::read(data, offset, bc)?;
    debug!(
        name = %model_header.name,
        objects = model_header.objects_entries,
        bones = model_header.skeleton_entries,
        "Decoding BCH model"
    );

    let mut model = SceneModel::new(model_header.name.clone());
    model.transform = model_header.transform;

    let object_names = read_names(
        data,
        model_header.node_name_offset as usize,
        model_header.node_name_entries as usize,
    )?;

    let materials_entries = model_header.materials_entries as usize;
    check_table(
        data,
        model_header.materials_offset as usize,
        materials_entries,
        material_stride(bc),
    )?;
    model.materials = (0..materials_entries)
        .map(|i| read_material(data, model_header.materials_offset as usize, i, bc))
        .collect::<Result<_>>()?;

    let mut skeleton = SkeletonBuilder::new();
    if model_header.skeleton_offset != 0 {
        let offset = model_header.skeleton_offset as usize;
        check_table(data, offset, model_header.skeleton_entries as usize, BONE_STRIDE)?;
        let mut reader = ByteReader::at(data, offset);
        for _ in 0..model_header.skeleton_entries {
            skeleton.push(read_bone(&mut reader)?)?;
        }
    }
    let world_transforms = skeleton.world_transforms();

    let visibility = if model_header.node_visibility_offset != 0 {
        u32_at(data, model_header.node_visibility_offset as usize)?
    } else {
        u32::MAX
    };

    let objects_entries = model_header.objects_entries as usize;
    check_table(
        data,
        model_header.objects_offset as usize,
        objects_entries,
        OBJECT_STRIDE,
    )?;
    for object_index in 0..objects_entries {
        let object_offset = model_header.objects_offset as usize + object_index * OBJECT_STRIDE;
        let object = ObjectRecord::read(data, object_offset, bc)?;
        if object.is_silhouette {
            debug!(object_index, "Skipping silhouette object");
            continue;
        }

        let mut vertex_commands = GpuCommandInterpreter::run(
            data,
            object.vertex_commands_offset as usize,
            object.vertex_commands_words as usize,
        )?;
        let uniforms = vertex_commands.vertex_uniforms();
        let layout = vertex_commands.attribute_layout()?;

        let node = usize::from(object.node_id);
        let mut mesh = Mesh {
            name: object_names
                .get(node)
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("mesh{}", model.meshes.len())),
            material_id: resolve_material(object.material_id, model.materials.len(), object_index),
            visible: node >= 32 || visibility & (1 << node) != 0,
            render_priority: object.render_priority,
            ..Mesh::default()
        };
        for group in read_face_groups(data, &model_header, &object, object_index)? {
            let indices = read_indices(data, &group.indices)?;
            let assembler = VertexAssembler::new(
                data,
                &layout,
                uniforms,
                group.skinning,
                &group.nodes,
                &world_transforms,
            );
            assembler.assemble_into(&indices, &mut mesh, &mut model)?;
        }

        model.meshes.push(mesh);
    }

    model.bones = skeleton.finish();
    Ok(model)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::formats::bch::commands::reg;
    use crate::formats::bch::commands::test_support::{command, to_bytes};

    pub fn put_u16(data: &mut [u8], at: usize, value: u16) {
        data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(data: &mut [u8], at: usize, value: u32) {
        data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_f32s(data: &mut [u8], at: usize, values: &[f32]) {
        for (i, v) in values.iter().enumerate() {
            data[at + i * 4..at + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    fn put_bytes(data: &mut [u8], at: usize, bytes: &[u8]) {
        data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Command block for a vertex buffer at `address` with the given format
    /// table, attribute count, stride and slot-to-semantic table.
    fn vertex_commands(address: u32, formats: u32, count: u32, stride: u32, semantics: u32) -> Vec<u8> {
        let mut words = command(reg::ATTRIBUTES_FORMAT_LOW, &[formats]);
        words.extend(command(
            reg::ATTRIBUTES_BUFFER0_ADDRESS,
            &[address, 0x10, (count << 28) | (stride << 16)],
        ));
        words.extend(command(reg::ATTRIBUTES_PERMUTATION_LOW, &[semantics]));
        to_bytes(&words)
    }

    /// One model at offset 0, decoded with backward compatibility 0x21.
    ///
    /// - material 0 `mat` at 0xA0
    /// - bones `root` (scale 2, at y=1, parent -1) and `arm` (child, at x=1)
    ///   at 0x100
    /// - objects at 0x200:
    ///   0. rigid skin on `arm`, material 0, explicit faces at 0x300
    ///   1. silhouette with an out-of-range command pointer
    ///   2. static, material 5, faces from the implicit table at 0x2F0
    /// - vertex buffers at 0x500 (position + bone slot, stride 16) and 0x580
    ///   (position, stride 12)
    pub fn skinned_model() -> Vec<u8> {
        let mut data = vec![0u8; 0x800];

        // header: identity transform, then the table pointers
        put_f32s(&mut data, 0x04, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        put_u32(&mut data, 0x34, 0xA0);
        put_u32(&mut data, 0x38, 1);
        put_u32(&mut data, 0x40, 0x200);
        put_u32(&mut data, 0x44, 3);
        put_u32(&mut data, 0x70, 0x100);
        put_u32(&mut data, 0x74, 2);
        put_u32(&mut data, 0x84, 0x700);

        put_u32(&mut data, 0xA0 + 0x28, 0x710);

        for (at, parent, scale, translation, name) in [
            (0x100, 0xFFFFu16, 2.0f32, [0.0f32, 1.0, 0.0], 0x720),
            (0x164, 0, 1.0, [1.0, 0.0, 0.0], 0x728),
        ] {
            put_u16(&mut data, at + 4, parent);
            put_f32s(&mut data, at + 8, &[scale; 3]);
            put_f32s(&mut data, at + 0x20, &translation);
            put_u32(&mut data, at + 0x5C, name);
        }

        // objects: material, flags, node, priority, vertex commands, faces
        for (at, fields) in [
            (0x200, [0u16, 0, 0, 3]),
            (0x238, [0, 1, 1, 0]),
            (0x270, [5, 0, 2, 0]),
        ] {
            for (i, v) in fields.iter().enumerate() {
                put_u16(&mut data, at + i * 2, *v);
            }
        }
        for (i, v) in [0x340u32, 8, 0x300, 1].iter().enumerate() {
            put_u32(&mut data, 0x208 + i * 4, *v);
        }
        for (i, v) in [0xFFFF_0000u32, 2, 0, 0].iter().enumerate() {
            put_u32(&mut data, 0x240 + i * 4, *v);
        }
        for (i, v) in [0x400u32, 8, 0, 0].iter().enumerate() {
            put_u32(&mut data, 0x278 + i * 4, *v);
        }

        // implicit face table of object 2
        put_u32(&mut data, 0x2F0, 0x480);
        put_u32(&mut data, 0x2F4, 1);
        put_u32(&mut data, 0x480, 0x4A0);
        put_u32(&mut data, 0x484, 3);

        // face group of object 0: rigid, one node (bone 1)
        put_u16(&mut data, 0x300, 2);
        put_u16(&mut data, 0x302, 1);
        put_u16(&mut data, 0x304, 1);
        put_u32(&mut data, 0x32C, 0x3C0);
        put_u32(&mut data, 0x330, 4);

        // slot 0 float3 position, slot 1 ubyte bone index
        put_bytes(&mut data, 0x340, &vertex_commands(0x500, 0x1B, 2, 16, 0x70));
        put_bytes(
            &mut data,
            0x3C0,
            &to_bytes(&command(reg::INDEX_BUFFER_CONFIG, &[0x8000_04C0, 3])),
        );
        put_bytes(&mut data, 0x400, &vertex_commands(0x580, 0xB, 1, 12, 0));

        for (i, index) in [2u16, 1, 0].iter().enumerate() {
            put_u16(&mut data, 0x4A0 + i * 2, *index);
        }
        for (i, index) in [0u16, 1, 2].iter().enumerate() {
            put_u16(&mut data, 0x4C0 + i * 2, *index);
        }

        for (i, position) in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]].iter().enumerate() {
            put_f32s(&mut data, 0x500 + i * 16, position);
        }
        for (i, position) in [[5.0f32, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]].iter().enumerate() {
            put_f32s(&mut data, 0x580 + i * 12, position);
        }

        put_bytes(&mut data, 0x700, b"pm\0");
        put_bytes(&mut data, 0x710, b"mat\0");
        put_bytes(&mut data, 0x720, b"root\0");
        put_bytes(&mut data, 0x728, b"arm\0");
        data
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::test_support::{put_u32, skinned_model};
    use super::*;
    use crate::error::Error;

    fn header() -> BchHeader {
        BchHeader {
            backward_compatibility: 0x21,
            ..BchHeader::default()
        }
    }

    fn positions(mesh: &Mesh) -> Vec<Vec3> {
        mesh.vertices.iter().map(|v| v.position).collect()
    }

    #[test]
    fn test_decode_skinned_model() {
        let model = decode_model(&skinned_model(), &header(), 0).unwrap();

        assert_eq!(model.name, "pm");
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].name, "mat");
        // the silhouette object is not emitted
        assert_eq!(model.meshes.len(), 2);

        let skinned = &model.meshes[0];
        assert_eq!(skinned.name, "mesh0");
        assert_eq!(skinned.material_id, Some(0));
        assert_eq!(skinned.render_priority, 3);
        assert_eq!(skinned.skinning, SkinningMode::Rigid);
        assert_eq!(skinned.vertices.len() / 3, 1);
        assert!(skinned.has_node);
        assert_eq!(skinned.vertices[0].bone_indices, vec![1]);
        assert_eq!(skinned.vertices[0].bone_weights, vec![1.0]);
        // baked against the unpropagated bind pose of `arm`
        assert_eq!(
            positions(skinned),
            vec![
                Vec3::new(2.0, 1.0, 0.0),
                Vec3::new(4.0, 1.0, 0.0),
                Vec3::new(2.0, 3.0, 0.0),
            ]
        );

        let fixed = &model.meshes[1];
        assert_eq!(fixed.name, "mesh1");
        assert_eq!(fixed.skinning, SkinningMode::None);
        assert_eq!(
            positions(fixed),
            vec![
                Vec3::new(0.0, 0.0, 5.0),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(5.0, 0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_scale_propagation_runs_last() {
        let model = decode_model(&skinned_model(), &header(), 0).unwrap();

        let names: Vec<_> = model.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["root", "arm"]);
        assert_eq!(model.bones[0].absolute_scale, Vec3::splat(2.0));
        assert_eq!(model.bones[1].absolute_scale, Vec3::splat(2.0));
        assert_eq!(model.bones[1].scale, Vec3::ONE);
        assert_eq!(model.bones[1].translation, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_out_of_range_material_is_unassigned() {
        let model = decode_model(&skinned_model(), &header(), 0).unwrap();
        assert_eq!(model.meshes[1].material_id, None);

        let mut data = skinned_model();
        put_u32(&mut data, 0x38, 0);
        let model = decode_model(&data, &header(), 0).unwrap();
        assert!(model.materials.is_empty());
        assert!(model.meshes.iter().all(|m| m.material_id.is_none()));
    }

    #[test]
    fn test_oversized_counts_are_errors() {
        // skeleton entries, object entries, face entries of object 0
        for at in [0x74, 0x44, 0x214] {
            let mut data = skinned_model();
            put_u32(&mut data, at, u32::MAX);
            assert!(
                matches!(decode_model(&data, &header(), 0), Err(Error::UnexpectedEof { .. })),
                "count at 0x{at:x}"
            );
        }
    }

    #[test]
    fn test_model_header_transform_is_row_major() {
        let mut data = vec![0u8; 4];
        let rows = [
            1.0f32, 0.0, 0.0, 5.0, //
            0.0, 1.0, 0.0, 6.0, //
            0.0, 0.0, 1.0, 7.0,
        ];
        for v in rows {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.resize(0x200, 0);

        let header = ModelHeader::read(&data, 0, 0x20).unwrap();
        assert_eq!(
            header.transform.transform_point3(Vec3::ZERO),
            Vec3::new(5.0, 6.0, 7.0)
        );
    }
}
