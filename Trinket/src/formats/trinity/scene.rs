//! Trinity descriptors to [`SceneModel`] / [`AnimationClip`].

use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};
use tracing::{debug, warn};

use super::descriptors::{
    AnimationDescriptor, AttributeSemantic, MaterialDescriptor, MaterialEntry,
    MeshBufferDescriptor, MeshDescriptor, MeshShape, SkeletonDescriptor, VertexFormat,
    VertexStream,
};
use crate::error::{Error, Result};
use crate::scene::{
    AnimationClip, Bone, BoneTrack, Material, Mesh, SceneModel, SkeletonBuilder, SkinningMode,
    TextureWrap, Vertex, pack_color,
};

/// Texture slot names that carry the base colour, in priority order.
const BASE_COLOR_SLOTS: [&str; 2] = ["BaseColorMap", "ColorMap"];

/// Decoded descriptors of one model.
#[derive(Debug, Clone, Default)]
pub struct ModelParts {
    pub skeleton: Option<SkeletonDescriptor>,
    pub materials: Vec<MaterialDescriptor>,
    /// Each mesh descriptor with its mesh buffer.
    pub meshes: Vec<(MeshDescriptor, MeshBufferDescriptor)>,
}

/// Build the bone list of a skeleton, scale propagation included.
///
/// # Errors
/// Returns [`Error::InvalidBoneParent`] if a node's parent does not precede
/// it.
pub fn decode_skeleton(skeleton: &SkeletonDescriptor) -> Result<Vec<Bone>> {
    let mut builder = SkeletonBuilder::with_capacity(skeleton.nodes.len());
    for node in &skeleton.nodes {
        builder.push(Bone::new(node.name.clone(), node.parent).with_srt(
            Vec3::from_array(node.scale),
            Vec3::from_array(node.rotation),
            Vec3::from_array(node.translation),
        ))?;
    }
    Ok(builder.finish())
}

/// Map skinning joint indices to bone indices.
fn joint_map(skeleton: &SkeletonDescriptor) -> HashMap<usize, usize> {
    skeleton
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(bone, node)| usize::try_from(node.joint_index).ok().map(|j| (j, bone)))
        .collect()
}

fn wrap_mode(value: u32) -> TextureWrap {
    match value {
        1 => TextureWrap::ClampToEdge,
        2 => TextureWrap::Mirror,
        3 => TextureWrap::ClampToBorder,
        _ => TextureWrap::Repeat,
    }
}

/// Texture name as exported: the file stem of the referenced texture file.
#[must_use]
pub fn texture_name(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn decode_material(entry: &MaterialEntry) -> Material {
    let mut material = Material::new(entry.name.clone());

    let mut refs: Vec<_> = entry.textures.iter().collect();
    // base colour first so the diffuse slot is the one exported as such
    refs.sort_by_key(|t| {
        BASE_COLOR_SLOTS
            .iter()
            .position(|s| *s == t.name)
            .unwrap_or(BASE_COLOR_SLOTS.len())
    });
    for (slot, texture) in material.textures.iter_mut().zip(refs) {
        *slot = texture_name(&texture.file);
    }

    for (mapper, sampler) in material.mappers.iter_mut().zip(&entry.samplers) {
        mapper.wrap_u = wrap_mode(sampler.repeat_u);
        mapper.wrap_v = wrap_mode(sampler.repeat_v);
    }
    material
}

/// Reads vertices of one shape out of its vertex streams.
struct ShapeReader<'a> {
    shape: &'a MeshShape,
    vertex_buffers: &'a [Vec<u8>],
    joints: &'a HashMap<usize, usize>,
}

impl ShapeReader<'_> {
    fn stream_value(
        stream: &VertexStream,
        buffer: &[u8],
        index: usize,
        offset: u32,
        format: VertexFormat,
    ) -> Result<Vec4> {
        format.read(buffer, index * stream.stride as usize + offset as usize)
    }

    fn vertex(&self, index: usize, mesh: &mut Mesh) -> Result<Vertex> {
        let mut vertex = Vertex::default();
        let mut bone_indices = Vec4::ZERO;
        let mut bone_weights = None;

        for (stream, buffer) in self.shape.streams.iter().zip(self.vertex_buffers) {
            for attribute in &stream.attributes {
                let value =
                    Self::stream_value(stream, buffer, index, attribute.offset, attribute.format)?;
                match attribute.semantic {
                    AttributeSemantic::Position => vertex.position = value.truncate(),
                    AttributeSemantic::Normal => {
                        vertex.normal = value.truncate();
                        mesh.has_normal = true;
                    }
                    AttributeSemantic::Tangent => {
                        vertex.tangent = value.truncate();
                        mesh.has_tangent = true;
                    }
                    AttributeSemantic::Color if attribute.layer == 0 => {
                        let rgba = if attribute.format == VertexFormat::Rgba8Uint {
                            value
                        } else {
                            value * 255.0
                        };
                        let [r, g, b, a] =
                            rgba.to_array().map(|c| c.round().clamp(0.0, 255.0) as u8);
                        vertex.color = pack_color(r, g, b, a);
                        mesh.has_color = true;
                    }
                    AttributeSemantic::TexCoord if attribute.layer < 3 => {
                        let layer = attribute.layer as usize;
                        vertex.uv[layer] = Vec2::new(value.x, 1.0 - value.y);
                        mesh.uv_count = mesh.uv_count.max(layer + 1);
                    }
                    AttributeSemantic::BlendIndices => {
                        bone_indices = value;
                        mesh.has_node = true;
                    }
                    AttributeSemantic::BlendWeights => {
                        bone_weights = Some(value);
                        mesh.has_weight = true;
                    }
                    _ => {}
                }
            }
        }

        if mesh.has_node {
            let weights = bone_weights.unwrap_or(Vec4::new(1.0, 0.0, 0.0, 0.0));
            for (joint, weight) in bone_indices.to_array().into_iter().zip(weights.to_array()) {
                if weight <= 0.0 {
                    continue;
                }
                let joint = joint as usize;
                vertex
                    .bone_indices
                    .push(self.joints.get(&joint).copied().unwrap_or(joint));
                vertex.bone_weights.push(weight);
            }
            vertex.normalize_weights();
        }
        Ok(vertex)
    }
}

fn decode_shape(
    model: &mut SceneModel,
    shape: &MeshShape,
    index_buffers: &[Vec<u8>],
    vertex_buffers: &[Vec<u8>],
    joints: &HashMap<usize, usize>,
) -> Result<()> {
    let indices = index_buffers.first().map(Vec::as_slice).unwrap_or_default();
    let reader = ShapeReader {
        shape,
        vertex_buffers,
        joints,
    };

    for (sub_index, sub_mesh) in shape.sub_meshes.iter().enumerate() {
        let material_id = model
            .materials
            .iter()
            .position(|m| m.name == sub_mesh.material_name);
        if material_id.is_none() {
            warn!(
                "Shape '{}' references unknown material '{}'",
                shape.name, sub_mesh.material_name
            );
        }

        let mut mesh = Mesh {
            name: if shape.sub_meshes.len() > 1 {
                format!("{}_{sub_index}", shape.name)
            } else {
                shape.name.clone()
            },
            material_id,
            visible: true,
            ..Mesh::default()
        };

        let start = sub_mesh.index_offset as usize;
        for i in start..start + sub_mesh.index_count as usize {
            let index = shape.index_type.read(indices, i)? as usize;
            let vertex = reader.vertex(index, &mut mesh)?;
            model.widen_bounds(vertex.position);
            mesh.vertices.push(vertex);
        }
        if mesh.has_node {
            mesh.skinning = SkinningMode::Smooth;
        }
        model.meshes.push(mesh);
    }
    Ok(())
}

/// Assemble a model from its descriptors.
///
/// # Errors
/// Returns an error if a shape has no matching buffer, or an index or vertex
/// read falls outside its buffer.
pub fn decode_model(name: &str, parts: &ModelParts) -> Result<SceneModel> {
    let mut model = SceneModel::new(name);

    let joints = match &parts.skeleton {
        Some(skeleton) => {
            model.bones = decode_skeleton(skeleton)?;
            joint_map(skeleton)
        }
        None => HashMap::new(),
    };

    model.materials = parts
        .materials
        .iter()
        .flat_map(|d| d.materials.iter().map(decode_material))
        .collect();

    for (mesh, buffers) in &parts.meshes {
        for (shape_index, shape) in mesh.shapes.iter().enumerate() {
            let buffer = buffers.buffers.get(shape_index).ok_or_else(|| {
                Error::InvalidDescriptor {
                    kind: "trmbf",
                    message: format!(
                        "no buffer for shape {shape_index} ('{}') of {}",
                        shape.name,
                        buffers.buffers.len()
                    ),
                }
            })?;
            decode_shape(
                &mut model,
                shape,
                &buffer.index_buffers,
                &buffer.vertex_buffers,
                &joints,
            )?;
        }
    }

    debug!(
        name,
        meshes = model.meshes.len(),
        bones = model.bones.len(),
        vertices = model.vertex_count(),
        "Decoded Trinity model"
    );
    Ok(model)
}

/// Convert an animation descriptor into a clip named `name`.
#[must_use]
pub fn decode_animation(name: &str, animation: &AnimationDescriptor) -> AnimationClip {
    let to_vec3 = |keys: &[[f32; 3]]| -> Vec<Vec3> {
        keys.iter().copied().map(Vec3::from_array).collect()
    };
    let tracks: Vec<BoneTrack> = animation
        .tracks
        .iter()
        .map(|track| BoneTrack {
            bone_name: track.bone_name.clone(),
            scale: to_vec3(&track.scale),
            rotation: to_vec3(&track.rotation),
            translation: to_vec3(&track.translation),
        })
        .collect();

    let longest_track = tracks
        .iter()
        .map(|t| t.scale.len().max(t.rotation.len()).max(t.translation.len()))
        .max()
        .unwrap_or(0);

    AnimationClip {
        name: name.to_string(),
        frame_count: (animation.frame_count as usize).max(longest_track),
        fps: animation.fps as f32,
        looping: animation.looping,
        tracks,
    }
}
