//! Vertex assembly from a resolved attribute layout.

use glam::{Mat4, Vec2, Vec4};

use super::commands::{AttributeLayout, IndexBuffer, IndexFormat, VertexSemantic, VertexUniforms};
use crate::error::{Error, Result};
use crate::scene::{Mesh, SceneModel, SkinningMode, Vertex, pack_color};
use crate::utils::reader::{slice_at, u16_at};

/// Read `index.count` indices from the index buffer.
///
/// # Errors
/// Returns [`Error::UnexpectedEof`] if the buffer runs past `data`.
pub fn read_indices(data: &[u8], index: &IndexBuffer) -> Result<Vec<u32>> {
    let base = index.address as usize;
    let count = index.count as usize;
    match index.format {
        IndexFormat::Byte => Ok(slice_at(data, base, count)?
            .iter()
            .map(|&b| u32::from(b))
            .collect()),
        IndexFormat::Short => (0..count)
            .map(|i| u16_at(data, base + i * 2).map(u32::from))
            .collect(),
    }
}

/// Convert a scaled colour channel to 8 bits: the fraction is dropped, then
/// the value is clamped to `0..=255`.
fn saturate(value: f32) -> u8 {
    value.trunc().clamp(0.0, 255.0) as u8
}

/// Decodes vertices of one sub-mesh.
#[derive(Debug)]
pub struct VertexAssembler<'a> {
    data: &'a [u8],
    layout: &'a AttributeLayout,
    uniforms: VertexUniforms,
    skinning: SkinningMode,
    /// Bones influencing this face, indexed by the per-vertex bone slot.
    node_list: &'a [usize],
    world_transforms: &'a [Mat4],
}

impl<'a> VertexAssembler<'a> {
    #[must_use]
    pub fn new(
        data: &'a [u8],
        layout: &'a AttributeLayout,
        uniforms: VertexUniforms,
        skinning: SkinningMode,
        node_list: &'a [usize],
        world_transforms: &'a [Mat4],
    ) -> Self {
        Self {
            data,
            layout,
            uniforms,
            skinning,
            node_list,
            world_transforms,
        }
    }

    fn node(&self, slot: f32) -> Result<usize> {
        let slot = slot as usize;
        self.node_list
            .get(slot)
            .copied()
            .ok_or(Error::BoneSlotOutOfRange {
                slot,
                len: self.node_list.len(),
            })
    }

    /// Decode the vertex at `index` of the vertex buffer.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedEof`] if the vertex lies outside the data,
    /// or [`Error::BoneSlotOutOfRange`] for a bone slot missing from the
    /// node list or the skeleton.
    pub fn assemble_vertex(&self, index: u32) -> Result<Vertex> {
        let u = &self.uniforms;
        let smooth = self.skinning.is_smooth();
        let start = self.layout.buffer_address as usize + index as usize * self.layout.stride;
        let bytes = slice_at(self.data, start, self.layout.stride)?;

        let mut vertex = Vertex::default();
        for attribute in &self.layout.attributes {
            let field = bytes.get(attribute.offset..).unwrap_or_default();
            let raw = attribute.format.read(field, start + attribute.offset)?;
            let components = attribute.format.components();

            match attribute.semantic {
                VertexSemantic::Position => {
                    vertex.position = raw.truncate() * u.position_scale + u.position_offset.truncate();
                }
                VertexSemantic::Normal => vertex.normal = raw.truncate() * u.normal_scale,
                VertexSemantic::Tangent => vertex.tangent = raw.truncate() * u.tangent_scale,
                VertexSemantic::Color => {
                    let c = raw * u.color_scale * 255.0;
                    let alpha = if components < 4 { 255 } else { saturate(c.w) };
                    vertex.color = pack_color(saturate(c.x), saturate(c.y), saturate(c.z), alpha);
                }
                VertexSemantic::TexCoord0 => vertex.uv[0] = uv(raw, u.texture0_scale),
                VertexSemantic::TexCoord1 => vertex.uv[1] = uv(raw, u.texture1_scale),
                VertexSemantic::TexCoord2 => vertex.uv[2] = uv(raw, u.texture2_scale),
                VertexSemantic::BoneIndex => {
                    let used = if smooth { components } else { 1 };
                    for c in 0..used {
                        vertex.bone_indices.push(self.node(raw[c])?);
                    }
                }
                VertexSemantic::BoneWeight => {
                    let used = if smooth { components } else { 1 };
                    for c in 0..used {
                        vertex.bone_weights.push(raw[c] * u.bone_weight_scale);
                    }
                }
                VertexSemantic::Other(_) => {}
            }
        }

        // Faces with up to four bones may omit per-vertex indices and use the
        // whole node list instead.
        if vertex.bone_indices.is_empty() && !self.node_list.is_empty() && self.node_list.len() <= 4 {
            vertex.bone_indices.extend_from_slice(self.node_list);
            if vertex.bone_weights.is_empty() {
                vertex.bone_weights.push(1.0);
            }
        }

        if !smooth && !vertex.bone_indices.is_empty() {
            if vertex.bone_weights.is_empty() {
                vertex.bone_weights.push(1.0);
            }
            let bone = vertex.bone_indices[0];
            let world = self
                .world_transforms
                .get(bone)
                .ok_or(Error::BoneSlotOutOfRange {
                    slot: bone,
                    len: self.world_transforms.len(),
                })?;
            vertex.position = world.transform_point3(vertex.position);
        }

        vertex.normalize_weights();
        Ok(vertex)
    }

    /// Decode every index in order into `mesh`, widening the model bounds.
    ///
    /// # Errors
    /// Propagates errors from [`VertexAssembler::assemble_vertex`].
    pub fn assemble_into(&self, indices: &[u32], mesh: &mut Mesh, model: &mut SceneModel) -> Result<()> {
        mesh.vertices.reserve(indices.len());
        for &index in indices {
            let vertex = self.assemble_vertex(index)?;
            model.widen_bounds(vertex.position);
            mesh.has_node |= !vertex.bone_indices.is_empty();
            mesh.has_weight |= !vertex.bone_weights.is_empty();
            mesh.vertices.push(vertex);
        }

        let layout = self.layout;
        mesh.skinning = self.skinning;
        mesh.has_normal = layout.has(VertexSemantic::Normal);
        mesh.has_tangent = layout.has(VertexSemantic::Tangent);
        mesh.has_color = layout.has(VertexSemantic::Color);
        mesh.uv_count = [
            VertexSemantic::TexCoord0,
            VertexSemantic::TexCoord1,
            VertexSemantic::TexCoord2,
        ]
        .iter()
        .filter(|s| layout.has(**s))
        .count();
        Ok(())
    }
}

fn uv(raw: Vec4, scale: f32) -> Vec2 {
    Vec2::new(raw.x, raw.y) * scale
}
